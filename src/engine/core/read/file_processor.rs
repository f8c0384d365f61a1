use crate::engine::core::read::dataset_document::{DatasetDocument, is_object};
use crate::engine::core::read::scratch_buffer::ScratchBuffer;
use crate::engine::core::utils::memory_monitor::MemoryMonitor;
use crate::engine::core::write::record_writer::{
    EntryCompletion, StreamingRecordWriter, WriteSignal,
};
use crate::engine::errors::RecordWriteError;
use crate::engine::types::{FileStatus, InputFile, ProcessResult};
use crate::shared::config::{CONFIG, MergeConfig};
use std::fs::File;
use std::io::{self, Read, Write};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Emits one input file as one dataset entry of the current batch.
///
/// The file is read whole into the shared scratch buffer (one file is
/// bounded, the aggregate is not) and parsed into borrowed slices. Records
/// are pulled in blocks of `chunk_size`; before each block the memory
/// monitor decides whether to go on.
pub struct SingleFileProcessor {
    config: MergeConfig,
    scratch: Arc<ScratchBuffer>,
}

impl Default for SingleFileProcessor {
    fn default() -> Self {
        let config = CONFIG.merge.clone();
        let scratch = Arc::new(ScratchBuffer::new(config.scratch_retain_bytes));
        Self::new(config, scratch)
    }
}

impl SingleFileProcessor {
    pub fn new(config: MergeConfig, scratch: Arc<ScratchBuffer>) -> Self {
        Self { config, scratch }
    }

    pub fn scratch(&self) -> &Arc<ScratchBuffer> {
        &self.scratch
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Drops scratch capacity above the retain limit. Called after large files.
    pub fn release_scratch(&self) -> usize {
        self.scratch.trim()
    }

    /// Returns `Err` only when the output stream fails. Everything wrong
    /// with the input is reported through `ProcessResult::status`.
    pub fn process<W: Write>(
        &self,
        input: &InputFile,
        out: &mut W,
        monitor: &MemoryMonitor,
        is_first_in_batch: bool,
        record_cap: Option<usize>,
    ) -> io::Result<ProcessResult> {
        let name = input.file_name();

        let mut file = match File::open(&input.path) {
            Ok(file) => file,
            Err(e) => {
                warn!(target: "file_processor::process", file = %name, error = %e, "Input unreadable");
                return Ok(ProcessResult::corrupt(format!("unreadable: {}", e)));
            }
        };
        let len = file.metadata().map(|m| m.len()).unwrap_or(input.size_bytes);
        if len < self.config.min_file_bytes {
            info!(target: "file_processor::process", file = %name, bytes = len, "Input below minimum size, no usable data");
            return Ok(ProcessResult::empty(format!("{} bytes", len)));
        }

        let mut buf = self.scratch.lock();
        buf.clear();
        buf.reserve(len as usize);
        if let Err(e) = file.read_to_end(&mut buf) {
            warn!(target: "file_processor::process", file = %name, error = %e, "Input read failed");
            return Ok(ProcessResult::corrupt(format!("read failed: {}", e)));
        }
        drop(file);

        let document = match DatasetDocument::parse(&buf) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(target: "file_processor::process", file = %name, error = %e, "Input is not a dataset document");
                return Ok(ProcessResult::corrupt(e.to_string()));
            }
        };
        if !document.has_object_info() {
            warn!(target: "file_processor::process", file = %name, "dataset_info is not an object");
            return Ok(ProcessResult::corrupt("dataset_info is not an object"));
        }

        let DatasetDocument {
            dataset_info,
            mut spectra,
        } = document;

        let listed = spectra.len();
        spectra.retain(|record| is_object(record));
        let mut skipped = listed - spectra.len();
        if skipped > 0 {
            warn!(target: "file_processor::process", file = %name, skipped, "Dropped malformed records");
        }
        if spectra.is_empty() {
            info!(target: "file_processor::process", file = %name, listed, "No usable spectra");
            let mut result = ProcessResult::empty("no usable spectra");
            result.records_skipped = skipped;
            return Ok(result);
        }

        let available = spectra.len();
        let take = record_cap.map_or(available, |cap| cap.min(available));
        if take < available {
            warn!(
                target: "file_processor::process",
                file = %name,
                available,
                kept = take,
                "Record cap applied, keeping the first records only"
            );
            spectra.truncate(take);
        }

        // The entry is only opened once the first block is cleared to run
        if monitor.should_pause() {
            warn!(target: "file_processor::process", file = %name, "Memory pressure before first record");
            return Ok(ProcessResult {
                records_written: 0,
                records_skipped: skipped,
                status: FileStatus::PausedByMemory,
                capped_from: None,
                entry_written: false,
                detail: Some("paused before first record".to_string()),
            });
        }

        let chunk_size = self.config.chunk_size_for(len);
        let mut writer = StreamingRecordWriter::new(out, self.config.flush_every_records);
        writer
            .write_header(&name, dataset_info, !is_first_in_batch)
            .map_err(into_io)?;

        let mut records = spectra.into_iter().peekable();
        let mut paused = false;
        let mut in_block = 0usize;

        while let Some(record) = records.next() {
            let mut check = match writer.write_record(record) {
                Ok(WriteSignal::Continue) => false,
                Ok(WriteSignal::CheckMemory) => true,
                Err(e) if e.is_record_local() => {
                    skipped += 1;
                    debug!(target: "file_processor::process", file = %name, error = %e, "Skipped record");
                    false
                }
                Err(e) => return Err(into_io(e)),
            };

            in_block += 1;
            if in_block == chunk_size {
                in_block = 0;
                check = true;
            }
            // One probe per boundary, and none after the last record
            if check && records.peek().is_some() && monitor.should_pause() {
                paused = true;
                break;
            }
        }

        let completion = if paused {
            EntryCompletion::Paused
        } else if take < available {
            EntryCompletion::Capped { available }
        } else {
            EntryCompletion::Complete
        };
        let written = writer.write_footer(completion).map_err(into_io)?;

        let status = if paused {
            warn!(target: "file_processor::process", file = %name, written, "Paused by memory pressure, entry is partial");
            FileStatus::PausedByMemory
        } else {
            FileStatus::Ok
        };

        info!(target: "file_processor::process", file = %name, written, skipped, status = ?status, "Processed input");
        Ok(ProcessResult {
            records_written: written,
            records_skipped: skipped,
            status,
            capped_from: (take < available).then_some(available),
            entry_written: true,
            detail: None,
        })
    }
}

fn into_io(e: RecordWriteError) -> io::Error {
    match e {
        RecordWriteError::Io(io) => io,
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    }
}
