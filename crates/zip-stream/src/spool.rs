//! Append-only byte spool that moves from memory to an anonymous temporary
//! file once it grows past a threshold.
//!
//! The transition is one way: once spilled, all further writes and reads go
//! to the file. The file is unlinked on creation, so the operating system
//! reclaims it when the buffer is dropped.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::debug;

/// Default spill threshold: 1 GiB.
pub const SPOOL_THRESHOLD: u64 = 1 << 30;

enum Storage {
    InMemory(Vec<u8>),
    Spilled(File),
}

/// Archive bytes written so far.
pub struct SpoolBuffer {
    storage: Storage,
    len: u64,
    threshold: u64,
}

impl SpoolBuffer {
    /// An empty in-memory buffer with the default threshold.
    pub fn new() -> Self {
        Self::with_threshold(SPOOL_THRESHOLD)
    }

    /// An empty in-memory buffer that spills once it would exceed
    /// `threshold` bytes.
    pub fn with_threshold(threshold: u64) -> Self {
        Self {
            storage: Storage::InMemory(Vec::new()),
            len: 0,
            threshold,
        }
    }

    /// Total bytes written.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self.storage, Storage::Spilled(_))
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Append `data`, spilling first if it would push the buffer past the
    /// threshold.
    pub fn append(&mut self, data: &[u8]) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let new_len = self.len + data.len() as u64;
        if new_len > self.threshold {
            self.spill()?;
        }

        match &mut self.storage {
            Storage::InMemory(buf) => buf.extend_from_slice(data),
            Storage::Spilled(file) => {
                file.seek(SeekFrom::End(0))?;
                file.write_all(data)?;
            }
        }
        self.len = new_len;
        Ok(())
    }

    /// Bytes from `pos` to the current end.
    pub fn read_from(&mut self, pos: u64) -> io::Result<Vec<u8>> {
        if pos >= self.len {
            return Ok(Vec::new());
        }

        match &mut self.storage {
            Storage::InMemory(buf) => Ok(buf[pos as usize..].to_vec()),
            Storage::Spilled(file) => {
                let mut out = vec![0u8; (self.len - pos) as usize];
                file.seek(SeekFrom::Start(pos))?;
                file.read_exact(&mut out)?;
                Ok(out)
            }
        }
    }

    fn spill(&mut self) -> io::Result<()> {
        let Storage::InMemory(buf) = &self.storage else {
            return Ok(());
        };

        let mut file = tempfile::tempfile()?;
        file.write_all(buf)?;
        debug!(
            bytes = self.len,
            threshold = self.threshold,
            "Spilling archive buffer to temporary file"
        );
        self.storage = Storage::Spilled(file);
        Ok(())
    }
}

impl Default for SpoolBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for SpoolBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.storage {
            Storage::InMemory(_) => Ok(()),
            Storage::Spilled(file) => file.flush(),
        }
    }
}

impl std::fmt::Debug for SpoolBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpoolBuffer")
            .field("len", &self.len)
            .field("threshold", &self.threshold)
            .field("spilled", &self.is_spilled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stays_in_memory_under_threshold() {
        let mut spool = SpoolBuffer::with_threshold(16);
        spool.append(b"0123456789").unwrap();
        spool.append(b"abcdef").unwrap();
        assert!(!spool.is_spilled());
        assert_eq!(spool.len(), 16);
        assert_eq!(spool.read_from(10).unwrap(), b"abcdef");
    }

    #[test]
    fn test_spills_past_threshold() {
        let mut spool = SpoolBuffer::with_threshold(16);
        spool.append(b"0123456789").unwrap();
        spool.append(b"abcdefg").unwrap();
        assert!(spool.is_spilled());
        assert_eq!(spool.len(), 17);
        assert_eq!(spool.read_from(0).unwrap(), b"0123456789abcdefg");

        // Reads do not disturb subsequent appends.
        assert_eq!(spool.read_from(15).unwrap(), b"fg");
        spool.append(b"XYZ").unwrap();
        assert_eq!(spool.read_from(15).unwrap(), b"fgXYZ");
    }

    #[test]
    fn test_read_past_end_is_empty() {
        let mut spool = SpoolBuffer::new();
        assert!(spool.read_from(0).unwrap().is_empty());
        spool.append(b"PK").unwrap();
        assert!(spool.read_from(2).unwrap().is_empty());
        assert!(spool.read_from(99).unwrap().is_empty());
    }

    #[test]
    fn test_write_trait() {
        let mut spool = SpoolBuffer::with_threshold(4);
        write!(spool, "hello {}", 42).unwrap();
        spool.flush().unwrap();
        assert!(spool.is_spilled());
        assert_eq!(spool.read_from(0).unwrap(), b"hello 42");
    }
}
