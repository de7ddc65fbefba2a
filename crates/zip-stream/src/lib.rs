//! Streaming zip archives.
//!
//! Builds a deflate zip archive member by member and yields its bytes as they
//! are produced, so an HTTP response can start before the archive is
//! complete. Written bytes are spooled in memory and moved to an anonymous
//! temporary file once the archive grows past [`SPOOL_THRESHOLD`].
//!
//! ```rust
//! use zip_stream::{build_archive, ArchiveEntry};
//!
//! let chunks: Vec<_> = build_archive(vec![
//!     ArchiveEntry::from_bytes("a.txt", "hello"),
//!     ArchiveEntry::from_bytes("b.txt", "world"),
//! ])
//! .collect::<Result<_, _>>()
//! .unwrap();
//!
//! assert_eq!(&chunks[0][..], b"PK");
//! let archive: Vec<u8> = chunks.concat();
//! assert_eq!(&archive[..4], b"PK\x03\x04");
//! ```

pub mod builder;
pub mod error;
pub mod spool;
pub mod stream;
pub mod zip;

pub use builder::{ArchiveBuilder, SENTINEL};
pub use error::ArchiveError;
pub use spool::{SpoolBuffer, SPOOL_THRESHOLD};
pub use stream::{
    build_archive, build_archive_with, stream_archive, stream_archive_with, ArchiveEntry,
    ArchiveStream, AsyncArchiveEntry,
};
pub use zip::{DeflatedMember, DosDateTime, MemberEncoder, ZipWriter};
