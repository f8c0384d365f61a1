use crate::engine::core::write::batch_file::BatchSink;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};

/// File-backed sink that starts failing once `fail_after` bytes went
/// through. A transient sink fails a single write; a permanent one fails
/// every write and truncate after the threshold.
pub struct FlakySink {
    file: File,
    fail_after: u64,
    passed: u64,
    permanent: bool,
    tripped: bool,
}

impl FlakySink {
    pub fn transient(file: File, fail_after: u64) -> Self {
        Self {
            file,
            fail_after,
            passed: 0,
            permanent: false,
            tripped: false,
        }
    }

    pub fn permanent(file: File, fail_after: u64) -> Self {
        Self {
            permanent: true,
            ..Self::transient(file, fail_after)
        }
    }

    fn should_fail(&mut self, len: usize) -> bool {
        if self.tripped {
            return self.permanent;
        }
        if self.passed + len as u64 > self.fail_after {
            self.tripped = true;
            return true;
        }
        false
    }
}

impl Write for FlakySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.should_fail(buf.len()) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        let n = self.file.write(buf)?;
        self.passed += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for FlakySink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl BatchSink for FlakySink {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        if self.permanent && self.tripped {
            return Err(io::Error::new(io::ErrorKind::Other, "injected truncate failure"));
        }
        self.file.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}
