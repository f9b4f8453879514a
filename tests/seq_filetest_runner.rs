//! Runner for the `.seq` filetests under tests/filetests.
//!
//! Every file carries its own `; RUN:` and `; CHECK:` directives and is
//! compiled once per RUN line.

use std::fs;
use std::path::{Path, PathBuf};

use q1seq::sequence::check::TestSpec;

/// Discovers all .seq files in a directory recursively
fn discover_seq_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(discover_seq_files(&path));
            } else if path.extension().and_then(|s| s.to_str()) == Some("seq") {
                files.push(path);
            }
        }
    }

    files.sort();
    files
}

fn run_seq_file(path: &Path) -> Result<(), String> {
    let _ = env_logger::builder().is_test(true).try_init();

    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    TestSpec::parse(&content)?.run()
}

#[test]
fn run_all_seq_files() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/filetests");
    let files = discover_seq_files(&dir);
    assert!(!files.is_empty(), "no .seq files found in {}", dir.display());

    let mut failures = Vec::new();
    for file in files {
        let relative = file.strip_prefix(&dir).unwrap_or(&file);
        print!("Running {}... ", relative.display());
        match run_seq_file(&file) {
            Ok(()) => println!("PASS"),
            Err(e) => {
                println!("FAIL");
                failures.push((file.clone(), e));
            }
        }
    }

    if !failures.is_empty() {
        eprintln!("\nFailures:");
        for (file, error) in &failures {
            eprintln!("  {}: {}", file.display(), error);
        }
        panic!("{} tests failed", failures.len());
    }
}
