//! Incremental archive construction over a spool buffer.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::ArchiveError;
use crate::spool::{SpoolBuffer, SPOOL_THRESHOLD};
use crate::zip::{MemberEncoder, ZipWriter};

/// First bytes of every zip archive, yielded before any work is done.
pub const SENTINEL: &[u8] = b"PK";

/// Builds an archive one member at a time and hands out the bytes written
/// since the previous call to [`ArchiveBuilder::take_available`].
///
/// The first two bytes are never handed out: they are the [`SENTINEL`]
/// already sent by the stream.
#[derive(Debug)]
pub struct ArchiveBuilder {
    zip: ZipWriter<SpoolBuffer>,
    read_pos: u64,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::with_spill_threshold(SPOOL_THRESHOLD)
    }

    /// Builder whose spool spills to disk past `threshold` bytes.
    pub fn with_spill_threshold(threshold: u64) -> Self {
        Self {
            zip: ZipWriter::new(SpoolBuffer::with_threshold(threshold)),
            read_pos: SENTINEL.len() as u64,
        }
    }

    /// Drain `chunks` fully, deflate them and write one member named `name`.
    ///
    /// A chunk error aborts the member; nothing is written for it.
    pub fn add_entry<I, B>(&mut self, name: &str, chunks: I) -> Result<(), ArchiveError>
    where
        I: IntoIterator<Item = Result<B, ArchiveError>>,
        B: AsRef<[u8]>,
    {
        if self.zip.is_finished() {
            return Err(ArchiveError::Finished);
        }

        let mut encoder = MemberEncoder::new();
        for chunk in chunks {
            let chunk = chunk.map_err(|e| {
                warn!(entry = name, error = %e, "Archive entry producer failed");
                ArchiveError::Producer {
                    name: name.to_string(),
                    message: e.to_string(),
                }
            })?;
            encoder.write(chunk.as_ref())?;
        }
        let member = encoder.finish()?;

        debug!(
            entry = name,
            uncompressed = member.uncompressed_size,
            compressed = member.compressed_size(),
            "Writing archive entry"
        );
        self.zip.write_member(name, &member)?;
        Ok(())
    }

    /// Write the central directory and end records.
    pub fn finish(&mut self) -> Result<(), ArchiveError> {
        self.zip.finish()?;
        debug!(
            entries = self.zip.entry_count(),
            bytes = self.zip.offset(),
            spilled = self.is_spilled(),
            "Archive finished"
        );
        Ok(())
    }

    /// Bytes written since the last call.
    pub fn take_available(&mut self) -> Result<Bytes, ArchiveError> {
        let pos = self.read_pos;
        let spool = self.zip.get_mut();
        let data = spool.read_from(pos)?;
        self.read_pos = pos.max(spool.len());
        Ok(Bytes::from(data))
    }

    pub fn entry_count(&self) -> usize {
        self.zip.entry_count()
    }

    /// Total archive bytes written, including the sentinel.
    pub fn bytes_written(&self) -> u64 {
        self.zip.offset()
    }

    pub fn is_spilled(&self) -> bool {
        self.zip.get_ref().is_spilled()
    }

    pub fn is_finished(&self) -> bool {
        self.zip.is_finished()
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(data: &'static [u8]) -> Vec<Result<&'static [u8], ArchiveError>> {
        vec![Ok(data)]
    }

    #[test]
    fn test_take_available_skips_sentinel() {
        let mut builder = ArchiveBuilder::new();
        builder.add_entry("a.txt", ok(b"hello")).unwrap();
        let first = builder.take_available().unwrap();
        // Remainder of the local header signature.
        assert_eq!(&first[..2], b"\x03\x04");
        assert!(builder.take_available().unwrap().is_empty());
    }

    #[test]
    fn test_failed_entry_writes_nothing() {
        let mut builder = ArchiveBuilder::new();
        builder.add_entry("a.txt", ok(b"hello")).unwrap();
        let before = builder.bytes_written();

        let chunks: Vec<Result<&[u8], ArchiveError>> =
            vec![Ok(&b"partial"[..]), Err(ArchiveError::source("connection reset"))];
        let err = builder.add_entry("b.txt", chunks).unwrap_err();
        assert!(matches!(err, ArchiveError::Producer { ref name, .. } if name == "b.txt"));
        assert_eq!(builder.bytes_written(), before);
        assert_eq!(builder.entry_count(), 1);
    }

    #[test]
    fn test_add_after_finish_fails() {
        let mut builder = ArchiveBuilder::new();
        builder.finish().unwrap();
        assert!(builder.is_finished());
        assert!(matches!(
            builder.add_entry("late.txt", ok(b"x")),
            Err(ArchiveError::Finished)
        ));
    }
}
