use crate::engine::errors::StateError;
use crate::engine::types::{BatchReport, InputFile};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Progress of an interrupted run, enough to skip what is already merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeState {
    pub output_dir: PathBuf,
    /// Number of input files already consumed
    pub current_file_index: usize,
    pub successful_files: usize,
    pub total_spectra: u64,
    pub completed_files: Vec<PathBuf>,
    pub completed_batches: Vec<usize>,
    pub updated_at: String,
}

impl MergeState {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            current_file_index: 0,
            successful_files: 0,
            total_spectra: 0,
            completed_files: Vec::new(),
            completed_batches: Vec::new(),
            updated_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Files of a batch count as done only when its output is a closed
    /// document; deferred files stay pending.
    pub fn record_batch(&mut self, report: &BatchReport) {
        if !report.output_is_valid() {
            return;
        }
        self.completed_files
            .extend(report.files.iter().map(|f| f.path.clone()));
        self.current_file_index += report.files.len();
        self.successful_files += report.datasets_succeeded();
        self.total_spectra += report.records_written();
        self.completed_batches.push(report.number);
        self.updated_at = chrono::Local::now().to_rfc3339();
    }

    pub fn next_batch_number(&self) -> usize {
        self.completed_batches.iter().max().map_or(1, |n| n + 1)
    }

    pub fn remaining(&self, files: &[InputFile]) -> Vec<InputFile> {
        let done: HashSet<&Path> = self.completed_files.iter().map(PathBuf::as_path).collect();
        files
            .iter()
            .filter(|f| !done.contains(f.path.as_path()))
            .cloned()
            .collect()
    }
}

/// Sidecar files of one output directory: `<prefix>.merge_state` and the
/// run marker `<prefix>.temp`.
#[derive(Debug, Clone)]
pub struct MergeStateStore {
    output_dir: PathBuf,
    prefix: String,
}

impl MergeStateStore {
    pub fn new(output_dir: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: prefix.to_string(),
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.merge_state", self.prefix))
    }

    pub fn marker_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.temp", self.prefix))
    }

    /// Returns the saved state of an interrupted run. A state file without
    /// the run marker is stale and ignored.
    pub fn load(&self) -> Result<Option<MergeState>, StateError> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(None);
        }
        if !self.marker_path().exists() {
            warn!(target: "merge_state::load", path = %path.display(), "State file without run marker, ignoring");
            return Ok(None);
        }

        let bytes = std::fs::read(&path)?;
        let state: MergeState = serde_json::from_slice(&bytes)?;
        if state.output_dir != self.output_dir {
            warn!(
                target: "merge_state::load",
                saved = %state.output_dir.display(),
                current = %self.output_dir.display(),
                "State belongs to another output directory, ignoring"
            );
            return Ok(None);
        }

        info!(
            target: "merge_state::load",
            completed_files = state.completed_files.len(),
            completed_batches = state.completed_batches.len(),
            "Loaded merge state"
        );
        Ok(Some(state))
    }

    pub fn mark_running(&self) -> Result<(), StateError> {
        std::fs::write(self.marker_path(), chrono::Local::now().to_rfc3339())?;
        Ok(())
    }

    pub fn save(&self, state: &MergeState) -> Result<(), StateError> {
        let path = self.state_path();
        let mut tmp_path = path.clone();
        tmp_path.set_extension("merge_state.tmp");

        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, state)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        std::fs::rename(&tmp_path, &path)?;
        if let Some(parent) = path.parent() {
            if let Ok(parent_file) = File::open(parent) {
                let _ = parent_file.sync_all();
            }
        }

        debug!(target: "merge_state::save", path = %path.display(), files = state.completed_files.len(), "Saved merge state");
        Ok(())
    }

    /// Removes state and marker after a clean run.
    pub fn clear(&self) -> Result<(), StateError> {
        for path in [self.state_path(), self.marker_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        debug!(target: "merge_state::clear", dir = %self.output_dir.display(), "Cleared merge state");
        Ok(())
    }
}
