// This module turns a finalized instruction queue into a Program: the instruction list,
// the data tables it references, compilation statistics and the total real-time duration.
// A Program renders the textual assembly listing (label column, mnemonic column,
// comma-separated operands, optional comment), an annotated listing that keeps settings
// replaced under a shared parameter update as #~ comment lines, and the structured
// document consumed by upload tooling. The document is built with serde and serialized
// with serde_json; tables are keyed by name in BTreeMaps so that identical input always
// produces identical output.

//! Program output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{CompilationStats, CompileError, CompileResult};

use super::instruction::Instruction;
use super::queue::InstructionQueue;
use super::tables::DataTables;

const LABEL_WIDTH: usize = 16;
const MNEMONIC_WIDTH: usize = 14;

/// Waveform or weight entry of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEntry {
    pub data: Vec<f64>,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionEntry {
    pub num_bins: u32,
    pub index: usize,
}

/// The structured program document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramDocument {
    pub program: String,
    pub waveforms: BTreeMap<String, SampleEntry>,
    pub weights: BTreeMap<String, SampleEntry>,
    pub acquisitions: BTreeMap<String, AcquisitionEntry>,
}

/// A compiled sequencer program.
#[derive(Debug, Clone)]
pub struct Program {
    instructions: Vec<Instruction>,
    tables: DataTables,
    stats: CompilationStats,
    duration: u64,
}

fn column(text: &str, width: usize) -> String {
    if text.len() >= width {
        format!("{text} ")
    } else {
        format!("{text:<width$}")
    }
}

fn render(instr: &Instruction) -> String {
    let label = instr
        .label
        .as_ref()
        .map(|l| format!("{l}:"))
        .unwrap_or_default();
    let mut line = format!(
        "{}{}{}",
        column(&label, LABEL_WIDTH),
        column(instr.mnemonic, MNEMONIC_WIDTH),
        instr.operand_text()
    );
    if let Some(comment) = &instr.comment {
        line.push_str("  # ");
        line.push_str(comment);
    }
    line.trim_end().to_string()
}

impl Program {
    /// Take over a finalized queue.
    pub fn new(queue: InstructionQueue, tables: DataTables) -> CompileResult<Self> {
        let (instructions, stats, duration) = queue.into_parts()?;
        Ok(Self {
            instructions,
            tables,
            stats,
            duration,
        })
    }

    /// All instructions, overwritten ones included.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn tables(&self) -> &DataTables {
        &self.tables
    }

    pub fn stats(&self) -> &CompilationStats {
        &self.stats
    }

    /// Real-time duration in ns, excluding the sync prologue.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Instructions that end up in the listing.
    pub fn active_instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter().filter(|i| !i.overwritten)
    }

    pub fn listing(&self) -> String {
        let mut out = String::new();
        for instr in self.active_instructions() {
            out.push_str(&render(instr));
            out.push('\n');
        }
        out
    }

    /// Listing with overwritten settings kept as `#~` lines.
    pub fn annotated_listing(&self) -> String {
        let mut out = String::new();
        for instr in &self.instructions {
            if instr.overwritten {
                out.push_str("#~ ");
            }
            out.push_str(&render(instr));
            out.push('\n');
        }
        out
    }

    pub fn to_document(&self) -> ProgramDocument {
        let samples = |(index, name, data): (usize, &str, &Vec<f64>)| {
            (
                name.to_string(),
                SampleEntry {
                    data: data.clone(),
                    index,
                },
            )
        };
        ProgramDocument {
            program: self.listing(),
            waveforms: self.tables.waveforms().map(samples).collect(),
            weights: self.tables.weights().map(samples).collect(),
            acquisitions: self
                .tables
                .acquisitions()
                .map(|(index, name, bins)| {
                    (
                        name.to_string(),
                        AcquisitionEntry {
                            num_bins: *bins,
                            index,
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> CompileResult<String> {
        serde_json::to_string_pretty(&self.to_document())
            .map_err(|e| CompileError::internal(format!("failed to serialize program: {e}")))
    }
}
