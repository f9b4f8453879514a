//! Waveform, weight and acquisition tables.
//!
//! Instructions reference data by index. Indices are handed out in
//! insertion order and are stable: adding a name again replaces its data
//! but keeps its index.

use hashbrown::HashMap;

use crate::core::{CompileError, CompileResult};

#[derive(Debug, Clone)]
struct Table<T> {
    entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn insert(&mut self, name: &str, value: T) -> usize {
        if let Some(&i) = self.index.get(name) {
            self.entries[i].1 = value;
            return i;
        }
        let i = self.entries.len();
        self.entries.push((name.to_string(), value));
        self.index.insert(name.to_string(), i);
        i
    }

    fn lookup(&self, name: &str) -> Option<(usize, &T)> {
        self.index.get(name).map(|&i| (i, &self.entries[i].1))
    }

    fn iter(&self) -> impl Iterator<Item = (usize, &str, &T)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, (name, value))| (i, name.as_str(), value))
    }
}

fn check_samples(kind: &str, name: &str, samples: &[f64]) -> CompileResult<()> {
    if samples.is_empty() {
        return Err(CompileError::value(format!("{kind} '{name}' has no samples")));
    }
    if let Some(bad) = samples.iter().find(|v| !(-1.0..=1.0).contains(*v)) {
        return Err(CompileError::value(format!(
            "{kind} '{name}' sample {bad} is outside [-1.0, 1.0]"
        )));
    }
    Ok(())
}

/// Data shared by all instructions of a program.
#[derive(Debug, Clone, Default)]
pub struct DataTables {
    waveforms: Table<Vec<f64>>,
    weights: Table<Vec<f64>>,
    acquisitions: Table<u32>,
}

impl DataTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_waveform(&mut self, name: &str, samples: Vec<f64>) -> CompileResult<usize> {
        check_samples("waveform", name, &samples)?;
        Ok(self.waveforms.insert(name, samples))
    }

    pub fn add_weight(&mut self, name: &str, samples: Vec<f64>) -> CompileResult<usize> {
        check_samples("weight", name, &samples)?;
        Ok(self.weights.insert(name, samples))
    }

    pub fn add_acquisition(&mut self, name: &str, num_bins: u32) -> CompileResult<usize> {
        if num_bins == 0 {
            return Err(CompileError::value(format!(
                "acquisition '{name}' needs at least one bin"
            )));
        }
        Ok(self.acquisitions.insert(name, num_bins))
    }

    pub fn waveform_index(&self, name: &str) -> CompileResult<usize> {
        self.waveforms
            .lookup(name)
            .map(|(i, _)| i)
            .ok_or_else(|| undefined(name))
    }

    pub fn weight_index(&self, name: &str) -> CompileResult<usize> {
        self.weights
            .lookup(name)
            .map(|(i, _)| i)
            .ok_or_else(|| undefined(name))
    }

    /// Index and bin count of an acquisition.
    pub fn acquisition(&self, name: &str) -> CompileResult<(usize, u32)> {
        self.acquisitions
            .lookup(name)
            .map(|(i, bins)| (i, *bins))
            .ok_or_else(|| undefined(name))
    }

    pub fn waveforms(&self) -> impl Iterator<Item = (usize, &str, &Vec<f64>)> {
        self.waveforms.iter()
    }

    pub fn weights(&self) -> impl Iterator<Item = (usize, &str, &Vec<f64>)> {
        self.weights.iter()
    }

    pub fn acquisitions(&self) -> impl Iterator<Item = (usize, &str, &u32)> {
        self.acquisitions.iter()
    }
}

fn undefined(name: &str) -> CompileError {
    CompileError::UndefinedName {
        name: name.to_string(),
    }
}
