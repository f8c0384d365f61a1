use crate::engine::core::write::counting_writer::CountingWriter;
use crate::engine::errors::BatchError;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const WRITE_BUFFER: usize = 64 * 1024;

/// Output stream a batch can be rolled back on.
pub trait BatchSink: Write + Seek {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl BatchSink for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchInfo {
    pub created_date: String,
    pub source_files: usize,
    pub batch_processing: bool,
    pub batch_number: usize,
    pub total_batches: usize,
}

impl BatchInfo {
    pub fn new(batch_number: usize, total_batches: usize, source_files: usize) -> Self {
        Self {
            created_date: chrono::Local::now().to_rfc3339(),
            source_files,
            batch_processing: true,
            batch_number,
            total_batches,
        }
    }
}

#[derive(Serialize)]
struct BatchSummaryFooter<'a> {
    datasets_written: usize,
    spectra_written: u64,
    status: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedBatch {
    pub path: PathBuf,
    pub bytes_written: u64,
    pub datasets_written: usize,
}

pub fn temp_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(".temp");
    PathBuf::from(name)
}

/// One batch output document:
///
/// ```text
/// {"batch_info": {..}, "datasets": [entry, ..], "batch_summary": {..}}
/// ```
///
/// Bytes go to `<final>.temp`; the file gets its final name only once the
/// footer is written and synced. `committed` is the stream offset after the
/// last complete dataset entry, the point `recover` rolls back to.
pub struct BatchFile<S: BatchSink> {
    out: CountingWriter<BufWriter<S>>,
    final_path: PathBuf,
    temp_path: PathBuf,
    header: Vec<u8>,
    header_committed: bool,
    committed: u64,
    datasets_written: usize,
    spectra_written: u64,
}

impl BatchFile<File> {
    pub fn create(final_path: &Path) -> Result<Self, BatchError> {
        let temp_path = temp_path_for(final_path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|source| BatchError::Open {
                path: temp_path.clone(),
                source,
            })?;
        info!(target: "batch_file::create", path = %temp_path.display(), "Opened batch output");
        Ok(Self::from_sink(file, final_path.to_path_buf(), temp_path))
    }
}

impl<S: BatchSink> BatchFile<S> {
    /// `sink` must already be the file living at `temp_path`.
    pub fn from_sink(sink: S, final_path: PathBuf, temp_path: PathBuf) -> Self {
        Self {
            out: CountingWriter::new(BufWriter::with_capacity(WRITE_BUFFER, sink)),
            final_path,
            temp_path,
            header: Vec::new(),
            header_committed: false,
            committed: 0,
            datasets_written: 0,
            spectra_written: 0,
        }
    }

    pub fn write_header(&mut self, info: &BatchInfo) -> Result<(), BatchError> {
        let mut header = Vec::with_capacity(256);
        header.extend_from_slice(b"{\"batch_info\":");
        serde_json::to_writer(&mut header, info)?;
        header.extend_from_slice(b",\"datasets\":[");
        self.header = header;

        self.out.write_all(&self.header)?;
        self.out.flush()?;
        self.header_committed = true;
        self.committed = self.out.count();
        Ok(())
    }

    /// Stream for the record writer of the next dataset entry.
    pub fn stream(&mut self) -> &mut CountingWriter<BufWriter<S>> {
        &mut self.out
    }

    /// Marks the entry just written as complete and moves the rollback point
    /// past it.
    pub fn commit_dataset(&mut self, records: usize) -> Result<(), BatchError> {
        self.out.flush()?;
        self.committed = self.out.count();
        self.datasets_written += 1;
        self.spectra_written += records as u64;
        debug!(
            target: "batch_file::commit_dataset",
            datasets = self.datasets_written,
            committed = self.committed,
            "Committed dataset entry"
        );
        Ok(())
    }

    pub fn datasets_written(&self) -> usize {
        self.datasets_written
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    fn footer(&self, status: &str) -> Result<Vec<u8>, BatchError> {
        let mut footer = b"],\"batch_summary\":".to_vec();
        serde_json::to_writer(
            &mut footer,
            &BatchSummaryFooter {
                datasets_written: self.datasets_written,
                spectra_written: self.spectra_written,
                status,
            },
        )?;
        footer.extend_from_slice(b"}\n");
        Ok(footer)
    }

    /// Writes the footer after the last committed entry and publishes the file.
    pub fn finish(mut self, status: &str) -> Result<FinishedBatch, BatchError> {
        self.close(status)?;
        self.publish()
    }

    /// Writes and flushes the footer. On error the file can still be
    /// handed to `recover`.
    pub fn close(&mut self, status: &str) -> Result<(), BatchError> {
        let footer = self.footer(status)?;
        self.out.write_all(&footer)?;
        self.out.flush()?;
        Ok(())
    }

    /// Syncs the closed document and moves it to its final name.
    pub fn publish(self) -> Result<FinishedBatch, BatchError> {
        let bytes_written = self.out.count();

        let buffered = self.out.into_inner();
        let mut sink = buffered.into_inner().map_err(|e| e.into_error())?;
        sink.sync()?;
        drop(sink);

        rename_into_place(&self.temp_path, &self.final_path)?;
        Ok(FinishedBatch {
            path: self.final_path,
            bytes_written,
            datasets_written: self.datasets_written,
        })
    }

    /// Drops whatever follows the last committed entry, closes the document
    /// there and publishes it. Used after a write error.
    pub fn recover(self, status: &str) -> Result<FinishedBatch, BatchError> {
        let footer = self.footer(status)?;
        let Self {
            out,
            final_path,
            temp_path,
            header,
            header_committed,
            committed,
            datasets_written,
            ..
        } = self;

        // Unflushed bytes belong to the entry being rolled back
        let (mut sink, _discarded) = out.into_inner().into_parts();

        let mut keep = committed;
        if !header_committed {
            keep = 0;
        }
        sink.truncate_to(keep)?;
        sink.seek(SeekFrom::Start(keep))?;
        if !header_committed {
            sink.write_all(&header)?;
            keep = header.len() as u64;
        }
        sink.write_all(&footer)?;
        sink.flush()?;
        sink.sync()?;
        drop(sink);

        warn!(
            target: "batch_file::recover",
            path = %final_path.display(),
            kept_bytes = keep,
            datasets_written,
            "Rolled batch output back to last complete dataset"
        );

        rename_into_place(&temp_path, &final_path)?;
        Ok(FinishedBatch {
            path: final_path,
            bytes_written: keep + footer.len() as u64,
            datasets_written,
        })
    }
}

fn rename_into_place(temp_path: &Path, final_path: &Path) -> Result<(), BatchError> {
    std::fs::rename(temp_path, final_path).map_err(|source| BatchError::Finalize {
        path: final_path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = final_path.parent() {
        if let Ok(parent_file) = File::open(parent) {
            let _ = parent_file.sync_all();
        }
    }
    info!(target: "batch_file::publish", path = %final_path.display(), "Published batch output");
    Ok(())
}
