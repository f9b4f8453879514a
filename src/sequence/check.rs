//! FileCheck-style validation for sequence filetests.
//!
//! A filetest is a text program whose `;` comments carry directives:
//!
//! ```text
//! ; RUN: compile --annotate
//! ; CHECK: set_awg_offs 16384,16384
//! ; CHECK-NEXT: upd_param 100
//! ; CHECK-NOT: wait
//! ```
//!
//! `RUN: not compile` expects the compilation to fail; the directives are then
//! matched against the error message. Matching ignores differences in the
//! amount of whitespace, so patterns do not depend on the listing columns.

use log::debug;

use crate::core::{CompileError, CompilerConfig, PhaseResolution};

use super::compiler::SequenceCompiler;
use super::parser::parse;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckDirective {
    /// `CHECK:` pattern somewhere after the previous match.
    Check(String),
    /// `CHECK-NEXT:` pattern on the line right after the previous match.
    CheckNext(String),
    /// `CHECK-NOT:` pattern absent up to the next positive match.
    CheckNot(String),
    /// `COM:` ignored.
    Comment(String),
}

/// Options of a `RUN:` line.
#[derive(Debug, Clone, PartialEq)]
pub struct RunDirective {
    pub expect_failure: bool,
    pub annotate: bool,
    pub config: CompilerConfig,
}

impl RunDirective {
    fn parse(text: &str) -> Result<Self, String> {
        let mut words = text.split_whitespace().peekable();
        let expect_failure = words.next_if_eq(&"not").is_some();
        match words.next() {
            Some("compile") => {}
            other => return Err(format!("unknown RUN command {other:?}")),
        }
        let mut run = RunDirective {
            expect_failure,
            annotate: false,
            config: CompilerConfig::default(),
        };
        for arg in words {
            let (flag, value) = match arg.split_once('=') {
                Some((flag, value)) => (flag, Some(value)),
                None => (arg, None),
            };
            match (flag, value) {
                ("--annotate", None) => run.annotate = true,
                ("--no-signed-emulation", None) => run.config.emulate_signed = false,
                ("--no-sync", None) => run.config.sync_on_start = false,
                ("--phase-resolution", Some(value)) => {
                    run.config.phase_resolution = match value {
                        "low" => PhaseResolution::Low,
                        "default" => PhaseResolution::Default,
                        "high" => PhaseResolution::High,
                        other => return Err(format!("unknown phase resolution '{other}'")),
                    }
                }
                ("--max-unrolled-waits", Some(value)) => {
                    run.config.max_unrolled_waits = value
                        .parse()
                        .map_err(|_| format!("invalid wait count '{value}'"))?;
                }
                ("--ramp-step", Some(value)) => {
                    run.config.ramp_step = value
                        .parse()
                        .map_err(|_| format!("invalid ramp step '{value}'"))?;
                }
                _ => return Err(format!("unknown RUN option '{arg}'")),
            }
        }
        Ok(run)
    }
}

/// Directives and program text of one filetest.
#[derive(Debug)]
pub struct TestSpec {
    pub run_directives: Vec<RunDirective>,
    pub check_directives: Vec<CheckDirective>,
    pub source: String,
}

impl TestSpec {
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut run_directives = Vec::new();
        let mut check_directives = Vec::new();

        for line in content.lines() {
            let trimmed = line.trim();
            let Some(comment) = trimmed.strip_prefix(';') else {
                continue;
            };
            let comment = comment.trim();
            if let Some(run) = comment.strip_prefix("RUN:") {
                run_directives.push(RunDirective::parse(run)?);
            } else if let Some(pattern) = comment.strip_prefix("CHECK-NEXT:") {
                check_directives.push(CheckDirective::CheckNext(pattern.trim().to_string()));
            } else if let Some(pattern) = comment.strip_prefix("CHECK-NOT:") {
                check_directives.push(CheckDirective::CheckNot(pattern.trim().to_string()));
            } else if let Some(pattern) = comment.strip_prefix("CHECK:") {
                check_directives.push(CheckDirective::Check(pattern.trim().to_string()));
            } else if let Some(text) = comment.strip_prefix("COM:") {
                check_directives.push(CheckDirective::Comment(text.trim().to_string()));
            }
        }
        if run_directives.is_empty() {
            return Err("filetest has no RUN directive".to_string());
        }

        Ok(TestSpec {
            run_directives,
            check_directives,
            source: content.to_string(),
        })
    }

    /// Compile the program once per RUN line and check every output.
    pub fn run(&self) -> Result<(), String> {
        for run in &self.run_directives {
            let output = execute(&self.source, run)?;
            validate_output(&output, &self.check_directives)?;
        }
        Ok(())
    }
}

fn execute(source: &str, run: &RunDirective) -> Result<String, String> {
    let result = parse(source)
        .map_err(CompileError::from)
        .and_then(|parsed| {
            SequenceCompiler::new(run.config.clone()).compile(&parsed.statements, parsed.tables)
        });
    match (result, run.expect_failure) {
        (Ok(program), false) => Ok(if run.annotate {
            program.annotated_listing()
        } else {
            program.listing()
        }),
        (Err(err), true) => Ok(err.to_string()),
        (Ok(program), true) => Err(format!(
            "expected compilation to fail, got:\n{}",
            program.listing()
        )),
        (Err(err), false) => Err(format!("compilation failed: {err}")),
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Match `output` against `directives`.
pub fn validate_output(output: &str, directives: &[CheckDirective]) -> Result<(), String> {
    let lines: Vec<String> = output.lines().map(normalize).collect();
    let mut line_idx = 0;
    let mut forbidden: Vec<&str> = Vec::new();

    let check_forbidden = |forbidden: &mut Vec<&str>, range: &[String]| -> Result<(), String> {
        for pattern in forbidden.drain(..) {
            let needle = normalize(pattern);
            if let Some(line) = range.iter().find(|line| line.contains(&needle)) {
                return Err(format!("CHECK-NOT: '{pattern}' found in '{line}'"));
            }
        }
        Ok(())
    };

    for directive in directives {
        match directive {
            CheckDirective::Comment(_) => {}
            CheckDirective::CheckNot(pattern) => forbidden.push(pattern),
            CheckDirective::Check(pattern) => {
                let needle = normalize(pattern);
                let found = lines
                    .iter()
                    .skip(line_idx)
                    .position(|line| line.contains(&needle));
                let Some(offset) = found else {
                    return Err(format!("CHECK: pattern '{pattern}' not found in output"));
                };
                check_forbidden(&mut forbidden, &lines[line_idx..line_idx + offset])?;
                line_idx += offset + 1;
                debug!("CHECK: '{}' found at line {}", pattern, line_idx - 1);
            }
            CheckDirective::CheckNext(pattern) => {
                let needle = normalize(pattern);
                let Some(line) = lines.get(line_idx) else {
                    return Err(format!("CHECK-NEXT: no more lines, expected '{pattern}'"));
                };
                if !line.contains(&needle) {
                    return Err(format!(
                        "CHECK-NEXT: expected '{pattern}' but got '{line}'"
                    ));
                }
                check_forbidden(&mut forbidden, &[])?;
                line_idx += 1;
            }
        }
    }
    check_forbidden(&mut forbidden, &lines[line_idx.min(lines.len())..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directives() {
        let content = "; RUN: not compile --no-sync --phase-resolution=high\n\
                       ; CHECK: timing error\n\
                       ; CHECK-NOT: internal\n\
                       ; COM: comment\n\
                       @0 play a a\n";
        let spec = TestSpec::parse(content).unwrap();
        assert_eq!(spec.run_directives.len(), 1);
        let run = &spec.run_directives[0];
        assert!(run.expect_failure);
        assert!(!run.config.sync_on_start);
        assert_eq!(run.config.phase_resolution, PhaseResolution::High);
        assert_eq!(spec.check_directives.len(), 3);
        assert!(TestSpec::parse("@0 play a a").is_err());
        assert!(TestSpec::parse("; RUN: compile --bogus").is_err());
    }

    #[test]
    fn test_matching_ignores_spacing() {
        let output = "                wait_sync     4\nplay          0,0,4\nstop\n";
        let directives = vec![
            CheckDirective::Check("wait_sync 4".to_string()),
            CheckDirective::CheckNext("play 0,0,4".to_string()),
            CheckDirective::CheckNot("wait".to_string()),
            CheckDirective::Check("stop".to_string()),
        ];
        validate_output(output, &directives).unwrap();
    }

    #[test]
    fn test_failures() {
        let output = "move 1,R0\nnop\nadd R0,1,R0\n";
        let next = vec![
            CheckDirective::Check("move".to_string()),
            CheckDirective::CheckNext("add".to_string()),
        ];
        assert!(validate_output(output, &next).unwrap_err().contains("CHECK-NEXT"));
        let not = vec![
            CheckDirective::Check("move".to_string()),
            CheckDirective::CheckNot("nop".to_string()),
            CheckDirective::Check("add".to_string()),
        ];
        assert!(validate_output(output, &not).unwrap_err().contains("CHECK-NOT"));
        let trailing_not = vec![CheckDirective::CheckNot("add".to_string())];
        assert!(validate_output(output, &trailing_not).is_err());
    }

    #[test]
    fn test_run_compiles_the_program() {
        let spec = TestSpec::parse(
            "; RUN: compile --no-sync\n\
             ; CHECK: set_mrk 1\n\
             ; CHECK-NEXT: upd_param 4\n\
             ; CHECK-NEXT: stop\n\
             @0 set_markers 1\n",
        )
        .unwrap();
        spec.run().unwrap();
    }
}
