//! Text programs compiled end to end and checked on the reference executor.

use q1seq::core::CompilerConfig;
use q1seq::q1::{ProgramDocument, Simulator};
use q1seq::sequence::{parse, RampTarget};
use q1seq::{ErrorKind, Program, SequenceBuilder, SequenceCompiler};

fn compile_with(text: &str, config: CompilerConfig) -> Program {
    let parsed = parse(text).unwrap();
    SequenceCompiler::new(config)
        .compile(&parsed.statements, parsed.tables)
        .unwrap()
}

fn compile(text: &str) -> Program {
    compile_with(text, CompilerConfig::default())
}

fn lines(program: &Program) -> Vec<String> {
    program
        .listing()
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect()
}

fn mnemonics(program: &Program) -> Vec<&'static str> {
    program.active_instructions().map(|i| i.mnemonic).collect()
}

#[test]
fn test_setting_then_play() {
    let program = compile(
        "waveform sq 1.0 1.0\n\
         @0   set_offset 0.5 0.5\n\
         @100 play sq sq\n",
    );
    assert_eq!(program.duration(), 104);
    assert_eq!(
        lines(&program),
        vec![
            "wait_sync 4",
            "set_awg_offs 16384,16384",
            "upd_param 100",
            "play 0,0,4",
            "stop"
        ]
    );

    let run = Simulator::new(program.instructions()).run().unwrap();
    assert_eq!(run.times_of("upd_param"), vec![0]);
    assert_eq!(run.times_of("play"), vec![100]);
    assert_eq!(run.elapsed, program.duration());
}

#[test]
fn test_setting_merges_into_play() {
    let program = compile(
        "waveform sq 1.0\n\
         @0 set_markers 1\n\
         @0 set_markers 5\n\
         @0 play sq\n",
    );
    assert_eq!(mnemonics(&program), vec!["wait_sync", "set_mrk", "play", "stop"]);
    assert!(lines(&program).contains(&"set_mrk 5".to_string()));
    let annotated = program.annotated_listing();
    assert!(annotated.lines().any(|l| l.starts_with("#~") && l.contains("set_mrk")));
    assert_eq!(program.stats().settings_overwritten, 1);
    assert_eq!(program.stats().updates_merged, 1);
}

#[test]
fn test_repeat_loop_runs_every_iteration() {
    let program = compile(
        "waveform sq 1.0\n\
         @0   repeat 3\n\
         @0   play sq\n\
         @100 end_loop\n\
         @300 play sq\n",
    );
    assert_eq!(program.duration(), 304);
    let run = Simulator::new(program.instructions()).run().unwrap();
    assert_eq!(run.times_of("play"), vec![0, 100, 200, 300]);
    assert_eq!(run.elapsed, 304);
}

#[test]
fn test_range_loop_counts_the_variable() {
    let program = compile(
        "waveform sq 1.0\n\
         @0  for i 0 10 3\n\
         @0  play sq\n\
         @20 end_for\n",
    );
    let run = Simulator::new(program.instructions()).run().unwrap();
    assert_eq!(run.times_of("play"), vec![0, 20, 40, 60]);
    assert_eq!(run.elapsed, 80);
    assert_eq!(program.duration(), 80);
}

#[test]
fn test_long_gap_becomes_wait_loop() {
    let text = "waveform sq 1.0\n@0 play sq\n@1000000 play sq\n";
    for max_unrolled_waits in [1, 3, 20] {
        let config = CompilerConfig::default().with_max_unrolled_waits(max_unrolled_waits);
        let program = compile_with(text, config);
        let run = Simulator::new(program.instructions()).run().unwrap();
        assert_eq!(run.times_of("play"), vec![0, 1_000_000]);
        let loops = program.stats().wait_loops;
        assert_eq!(loops, usize::from(max_unrolled_waits < 16));
    }
}

#[test]
fn test_ramp_lands_on_final_value() {
    let program = compile(
        "waveform sq 1.0\n\
         @0   ramp_offset 0.0 0.0 0.5 -0.5 1000\n\
         @1000 play sq\n",
    );
    let run = Simulator::new(program.instructions()).run().unwrap();
    // the final value is committed by the play itself
    assert_eq!(run.times_of("upd_param").len(), 10);
    assert_eq!(run.times_of("play"), vec![1000]);
    assert_eq!(program.duration(), 1004);
    assert!(lines(&program).contains(&"set_awg_offs 16384,-16384".to_string()));
}

#[test]
fn test_builder_and_text_agree() {
    let text = compile(
        "waveform sq 1.0\n\
         acquisition readout 2\n\
         @0   set_gain 0.5 0.5\n\
         @0   play sq sq\n\
         @100 acquire readout 1\n\
         @200 ramp_gain 0.5 0.5 0.0 0.0 200\n",
    );

    let mut builder = SequenceBuilder::new();
    builder.tables_mut().add_waveform("sq", vec![1.0]).unwrap();
    builder.tables_mut().add_acquisition("readout", 2).unwrap();
    builder
        .set_gain(0.5, 0.5)
        .play("sq", "sq", 100)
        .acquire("readout", 1i64, 100)
        .ramp(RampTarget::Gain, (0.5, 0.5), (0.0, 0.0), 200);
    let built = builder.compile(CompilerConfig::default()).unwrap();

    assert_eq!(text.listing(), built.listing());
    assert_eq!(text.duration(), built.duration());
}

#[test]
fn test_document_round_trips_through_json() {
    let program = compile(
        "waveform gauss 0.0 0.5 1.0 0.5 0.0\n\
         waveform zero 0.0\n\
         weight flat 1.0 1.0\n\
         acquisition readout 4\n\
         @0  play gauss zero\n\
         @20 acquire_weighed readout 3 flat flat\n",
    );
    let json = program.to_json().unwrap();
    let document: ProgramDocument = serde_json::from_str(&json).unwrap();
    assert_eq!(document, program.to_document());
    assert_eq!(document.waveforms["gauss"].index, 0);
    assert_eq!(document.waveforms["zero"].index, 1);
    assert_eq!(document.weights["flat"].data, vec![1.0, 1.0]);
    assert_eq!(document.acquisitions["readout"].num_bins, 4);
    assert!(document.program.contains("acquire_weighed"));
}

#[test]
fn test_errors_point_at_the_statement() {
    let parsed = parse(
        "waveform sq 1.0\n\
         @100 play sq\n\
         @100 play sq\n",
    )
    .unwrap();
    let err = SequenceCompiler::default()
        .compile(&parsed.statements, parsed.tables)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timing);
    assert!(err.to_string().starts_with("line 3: `@100 play sq sq`"));

    let parsed = parse("@0 set_offset 1.5 0.0\n").unwrap();
    let err = SequenceCompiler::default()
        .compile(&parsed.statements, parsed.tables)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);

    let parsed = parse("@0 repeat 2\n@0 set_markers 1\n").unwrap();
    let err = SequenceCompiler::default()
        .compile(&parsed.statements, parsed.tables)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
}

#[test]
fn test_out_of_range_numbers_are_reported() {
    let kind = |text: &str| {
        let parsed = parse(text).unwrap();
        SequenceCompiler::default()
            .compile(&parsed.statements, parsed.tables)
            .unwrap_err()
            .kind()
    };
    assert_eq!(
        kind("@0 var i int\n@0 for i 0 9223372036854775807 1\n@4 end_for\n"),
        ErrorKind::Value
    );
    // longer than 2^32 - 1 wait loop iterations
    assert_eq!(kind("@0 wait 300000000000000\n"), ErrorKind::Timing);
}
