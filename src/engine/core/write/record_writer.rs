use crate::engine::errors::RecordWriteError;
use serde::Serialize;
use std::io::Write;
use tracing::debug;

/// Encode buffer capacity kept between records; a huge record does not pin
/// its allocation for the rest of the dataset.
const ENCODE_BUF_RETAIN: usize = 256 * 1024;

/// Tells the caller what to do after a record was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteSignal {
    Continue,
    /// The stream was just flushed; consult the memory monitor before going on.
    CheckMemory,
}

/// How a dataset entry ended. Written into the entry so partial entries
/// describe themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryCompletion {
    Complete,
    Capped { available: usize },
    Paused,
}

impl EntryCompletion {
    pub fn label(&self) -> &'static str {
        match self {
            EntryCompletion::Complete => "complete",
            EntryCompletion::Capped { .. } => "capped",
            EntryCompletion::Paused => "paused_by_memory",
        }
    }
}

#[derive(Serialize)]
struct EntryFooter<'a> {
    spectra_count: usize,
    merge_status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    spectra_available: Option<usize>,
}

/// Serializes one dataset entry into a stream owned by the caller:
///
/// ```text
/// {"source_file": .., "dataset_info": .., "spectra": [r1, r2, ..],
///  "spectra_count": n, "merge_status": ..}
/// ```
///
/// Each record is encoded into a scratch buffer before it touches the
/// stream, so a record that fails to serialize leaves no bytes behind.
pub struct StreamingRecordWriter<'a, W: Write> {
    out: &'a mut W,
    encode_buf: Vec<u8>,
    flush_every: usize,
    written: usize,
    since_flush: usize,
}

impl<'a, W: Write> StreamingRecordWriter<'a, W> {
    pub fn new(out: &'a mut W, flush_every: usize) -> Self {
        Self {
            out,
            encode_buf: Vec::with_capacity(4096),
            flush_every: flush_every.max(1),
            written: 0,
            since_flush: 0,
        }
    }

    /// Opens the entry. `leading_separator` is set for every entry but the
    /// first one of a batch.
    pub fn write_header<M: Serialize + ?Sized>(
        &mut self,
        source_file: &str,
        dataset_info: &M,
        leading_separator: bool,
    ) -> Result<(), RecordWriteError> {
        self.encode_buf.clear();
        if leading_separator {
            self.encode_buf.push(b',');
        }
        self.encode_buf.extend_from_slice(b"{\"source_file\":");
        serde_json::to_writer(&mut self.encode_buf, source_file)?;
        self.encode_buf.extend_from_slice(b",\"dataset_info\":");
        serde_json::to_writer(&mut self.encode_buf, dataset_info)?;
        self.encode_buf.extend_from_slice(b",\"spectra\":[");

        self.out.write_all(&self.encode_buf)?;
        self.encode_buf.clear();
        Ok(())
    }

    pub fn write_record<R: Serialize + ?Sized>(
        &mut self,
        record: &R,
    ) -> Result<WriteSignal, RecordWriteError> {
        self.encode_buf.clear();
        if self.written > 0 {
            self.encode_buf.push(b',');
        }
        if let Err(e) = serde_json::to_writer(&mut self.encode_buf, record) {
            self.encode_buf.clear();
            return Err(RecordWriteError::Serialize(e));
        }

        self.out.write_all(&self.encode_buf)?;
        self.written += 1;
        self.since_flush += 1;

        if self.encode_buf.capacity() > ENCODE_BUF_RETAIN {
            self.encode_buf = Vec::with_capacity(4096);
        }

        if self.since_flush >= self.flush_every {
            self.out.flush()?;
            self.since_flush = 0;
            debug!(target: "record_writer::write_record", written = self.written, "Flushed record stream");
            return Ok(WriteSignal::CheckMemory);
        }
        Ok(WriteSignal::Continue)
    }

    /// Closes the entry and returns the number of records it holds.
    pub fn write_footer(mut self, completion: EntryCompletion) -> Result<usize, RecordWriteError> {
        let footer = EntryFooter {
            spectra_count: self.written,
            merge_status: completion.label(),
            spectra_available: match completion {
                EntryCompletion::Capped { available } => Some(available),
                _ => None,
            },
        };

        self.encode_buf.clear();
        self.encode_buf.extend_from_slice(b"],");
        let body = serde_json::to_vec(&footer)?;
        // Splice the footer object's fields into the open entry object
        self.encode_buf.extend_from_slice(&body[1..]);

        self.out.write_all(&self.encode_buf)?;
        Ok(self.written)
    }

    pub fn records_written(&self) -> usize {
        self.written
    }
}
