//! Command line driver.
//!
//! Usage: `q1seq <input.seq> [-o FILE] [--json] [--annotate] [--stats]`

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use log::{error, info};

use q1seq::core::{CompilerConfig, PhaseResolution};
use q1seq::sequence::parse;
use q1seq::{CompileError, Program, SequenceCompiler};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Resolution {
    Low,
    Default,
    High,
}

impl From<Resolution> for PhaseResolution {
    fn from(value: Resolution) -> Self {
        match value {
            Resolution::Low => PhaseResolution::Low,
            Resolution::Default => PhaseResolution::Default,
            Resolution::High => PhaseResolution::High,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "q1seq")]
#[command(about = "Compile a time-annotated pulse sequence into sequencer assembly")]
struct Args {
    /// Sequence file, `-` or nothing for stdin
    input: Option<PathBuf>,

    /// Write the output here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit the program document as JSON
    #[arg(long)]
    json: bool,

    /// Keep overwritten settings as `#~` lines
    #[arg(long, conflicts_with = "json")]
    annotate: bool,

    /// Print compilation statistics to stderr
    #[arg(long)]
    stats: bool,

    /// Use the raw unsigned shift and comparison instructions
    #[arg(long)]
    no_signed_emulation: bool,

    /// Accuracy of runtime phase conversion
    #[arg(long, value_enum, default_value = "default")]
    phase_resolution: Resolution,

    /// Longest gap, in `wait` instructions, emitted without a wait loop
    #[arg(long, default_value_t = 3)]
    max_unrolled_waits: usize,

    /// Update interval of offset and gain ramps in ns
    #[arg(long, default_value_t = 100)]
    ramp_step: u64,

    /// Do not emit the `wait_sync` prologue
    #[arg(long)]
    no_sync: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn config(&self) -> CompilerConfig {
        CompilerConfig::default()
            .with_signed_emulation(!self.no_signed_emulation)
            .with_phase_resolution(self.phase_resolution.into())
            .with_max_unrolled_waits(self.max_unrolled_waits)
            .with_ramp_step(self.ramp_step)
            .with_sync_on_start(!self.no_sync)
    }
}

fn read_input(path: Option<&PathBuf>) -> io::Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path),
        _ => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn compile(text: &str, config: CompilerConfig) -> Result<Program, CompileError> {
    let parsed = parse(text)?;
    SequenceCompiler::new(config).compile(&parsed.statements, parsed.tables)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let text = read_input(args.input.as_ref())?;
    let program = match compile(&text, args.config()) {
        Ok(program) => program,
        Err(err) => {
            error!("{err}");
            process::exit(1);
        }
    };

    let rendered = if args.json {
        program.to_json()?
    } else if args.annotate {
        program.annotated_listing()
    } else {
        program.listing()
    };

    match &args.output {
        Some(path) => {
            fs::write(path, rendered)?;
            info!("wrote {}", path.display());
        }
        None => print!("{rendered}"),
    }

    if args.stats {
        eprintln!("{}", program.stats());
        eprintln!("  Duration: {} ns", program.duration());
    }
    Ok(())
}
