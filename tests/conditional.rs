//! Conditional blocks: every trigger outcome leaves the block at the same time.

use q1seq::core::CompilerConfig;
use q1seq::q1::{Operator, Simulator};
use q1seq::sequence::parse;
use q1seq::{ErrorKind, Program, SequenceBuilder, SequenceCompiler};

fn compile(text: &str) -> Result<Program, q1seq::CompileError> {
    let parsed = parse(text)?;
    SequenceCompiler::default().compile(&parsed.statements, parsed.tables)
}

/// Branch `or` lasts 100 ns, branch `nor` 140 ns.
const TWO_BRANCHES: &str = "\
waveform sq 1.0
@0   if_start 0
@0   branch or
@0   play sq
@4   wait 96
@100 end_branch
@0   branch nor
@0   play sq
@4   wait 136
@140 end_branch
@140 if_end
@140 play sq
";

#[test]
fn test_branches_are_equalized() {
    let program = compile(TWO_BRANCHES).unwrap();
    for flags in [0b0, 0b1] {
        let run = Simulator::new(program.instructions())
            .with_flags(flags)
            .run()
            .unwrap();
        // both paths pay 4 ns for the play they skip
        assert_eq!(run.times_of("play").last(), Some(&144));
        assert_eq!(run.elapsed, 148);
    }
    assert_eq!(program.duration(), 148);

    let taken = Simulator::new(program.instructions())
        .with_flags(0b1)
        .run()
        .unwrap();
    assert_eq!(taken.times_of("play"), vec![0, 144]);
    let other = Simulator::new(program.instructions()).run().unwrap();
    assert_eq!(other.times_of("play"), vec![4, 144]);
}

#[test]
fn test_set_cond_brackets_the_block() {
    let program = compile(TWO_BRANCHES).unwrap();
    let conds: Vec<String> = program
        .active_instructions()
        .filter(|i| i.mnemonic == "set_cond")
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        conds,
        vec!["set_cond 1,1,0,4", "set_cond 1,1,1,4", "set_cond 0,0,0,4"]
    );
}

#[test]
fn test_implicit_else_branch() {
    let program = compile(
        "waveform sq 1.0\n\
         @0  if_start 0 1\n\
         @0  branch and\n\
         @0  play sq\n\
         @20 end_branch\n\
         @0  branch nor\n\
         @0  play sq\n\
         @40 end_branch\n\
         @40 if_end\n\
         @40 play sq\n",
    )
    .unwrap();
    // and + nor leave the mixed states to xor
    assert!(program
        .active_instructions()
        .any(|i| i.to_string() == "set_cond 1,3,4,4"));

    let exits: Vec<u64> = [0b00, 0b01, 0b10, 0b11]
        .into_iter()
        .map(|flags| {
            let run = Simulator::new(program.instructions())
                .with_flags(flags)
                .run()
                .unwrap();
            run.elapsed
        })
        .collect();
    assert!(exits.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(exits[0], program.duration());
}

/// One branch per operator over counters 0 and 1, each a play followed by a
/// wait of its own length.
fn two_counter_block(operators: &[(&str, u64)]) -> String {
    let mut text = String::from("waveform sq 1.0\n@0 if_start 0 1\n");
    for (op, wait) in operators {
        text.push_str(&format!(
            "@0 branch {op}\n@0 play sq\n@4 wait {wait}\n@{} end_branch\n",
            4 + wait
        ));
    }
    text.push_str("@400 if_end\n@400 play sq\n");
    text
}

#[test]
fn test_overlapping_operators_are_rejected() {
    // all set would run both branches
    let err = compile(&two_counter_block(&[("and", 96), ("or", 196)])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(err.to_string().contains("operators not exclusive"));

    for pair in [("and", "nand"), ("or", "nor"), ("xor", "xnor")] {
        let text = two_counter_block(&[(pair.0, 96), (pair.1, 196)]);
        assert_eq!(compile(&text).unwrap_err().kind(), ErrorKind::Syntax, "{pair:?}");
    }
}

#[test]
fn test_tri_state_blocks_have_constant_latency() {
    let blocks = [
        two_counter_block(&[("and", 96), ("nor", 196)]),
        two_counter_block(&[("xor", 36), ("and", 96)]),
        two_counter_block(&[("and", 96), ("nor", 196), ("xor", 36)]),
    ];
    for text in &blocks {
        let program = compile(text).unwrap();
        for flags in 0b00..=0b11 {
            let run = Simulator::new(program.instructions())
                .with_flags(flags)
                .run()
                .unwrap();
            // at most one branch body runs, then the trailing play
            assert!(run.times_of("play").len() <= 2, "flags {flags:02b}");
            assert_eq!(run.elapsed, program.duration(), "flags {flags:02b}");
        }
    }
    let exhaustive = compile(&blocks[2]).unwrap();
    for flags in 0b00..=0b11 {
        let run = Simulator::new(exhaustive.instructions())
            .with_flags(flags)
            .run()
            .unwrap();
        assert_eq!(run.times_of("play").len(), 2);
    }
}

#[test]
fn test_padding_is_limited_to_one_wait() {
    let err = compile(
        "waveform sq 1.0\n\
         @0     if_start 0\n\
         @0     branch or\n\
         @0     play sq\n\
         @4     wait 70000\n\
         @70004 end_branch\n\
         @0     branch nor\n\
         @0     play sq\n\
         @4     end_branch\n\
         @70004 if_end\n",
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timing);
    assert!(err.to_string().contains("padding"));
}

#[test]
fn test_builder_conditional_matches_text() {
    let mut builder = SequenceBuilder::new();
    builder.tables_mut().add_waveform("sq", vec![1.0]).unwrap();
    builder
        .conditional(&[0], |c| {
            c.branch(Operator::Or, |b| {
                b.play("sq", "sq", 4).wait(96);
            });
            c.branch(Operator::Nor, |b| {
                b.play("sq", "sq", 4).wait(136);
            });
        })
        .unwrap();
    builder.play("sq", "sq", 4);
    let built = builder.compile(CompilerConfig::default()).unwrap();
    let text = compile(TWO_BRANCHES).unwrap();
    assert_eq!(built.listing(), text.listing());
}

#[test]
fn test_malformed_blocks() {
    // all set satisfies both `or` and `and`
    let shadowed = compile(
        "waveform sq 1.0\n\
         @0 if_start 0 1\n\
         @0 branch or\n\
         @0 play sq\n\
         @4 end_branch\n\
         @0 branch and\n\
         @0 play sq\n\
         @4 end_branch\n\
         @8 if_end\n",
    );
    assert_eq!(shadowed.unwrap_err().kind(), ErrorKind::Syntax);

    let nested = compile(
        "@0 if_start 0\n\
         @0 branch or\n\
         @0 if_start 1\n",
    );
    assert_eq!(nested.unwrap_err().kind(), ErrorKind::Syntax);

    let stray = compile("@0 if_start 0\n@0 set_markers 1\n");
    assert_eq!(stray.unwrap_err().kind(), ErrorKind::Syntax);

    let bad_counter = compile("@0 if_start 15\n");
    assert_eq!(bad_counter.unwrap_err().kind(), ErrorKind::Value);

    let unclosed = compile("@0 if_start 0\n@0 branch or\n@0 end_branch\n");
    assert_eq!(unclosed.unwrap_err().kind(), ErrorKind::Syntax);
}
