//! Zip container encoding.
//!
//! Members are deflated in full before their local header is written, so the
//! CRC-32 and sizes are always known up front: no data descriptors are used
//! and the output is append-only. Zip64 records are written only when a
//! size, offset or the entry count overflows the classic fields.

use std::io::{self, Write};

use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use flate2::write::DeflateEncoder;
use flate2::Compression;

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;
const EOCD64_SIG: u32 = 0x0606_4b50;
const EOCD64_LOCATOR_SIG: u32 = 0x0706_4b50;

const ZIP64_EXTRA_ID: u16 = 0x0001;

const VERSION_DEFLATE: u16 = 20;
const VERSION_ZIP64: u16 = 45;
/// Unix host, APPNOTE 4.5
const VERSION_MADE_BY: u16 = (3 << 8) | VERSION_ZIP64;

/// General purpose flag: names are UTF-8.
const FLAG_UTF8: u16 = 0x0800;
const METHOD_DEFLATE: u16 = 8;

/// Regular file, rw-r--r--
const EXTERNAL_ATTRS: u32 = 0o100644 << 16;

const MAX_U16: u64 = u16::MAX as u64;
const MAX_U32: u64 = u32::MAX as u64;

/// A fully compressed member, ready to be written.
#[derive(Debug, Clone)]
pub struct DeflatedMember {
    pub crc32: u32,
    pub uncompressed_size: u64,
    pub data: Vec<u8>,
}

impl DeflatedMember {
    pub fn compressed_size(&self) -> u64 {
        self.data.len() as u64
    }

    fn needs_zip64(&self) -> bool {
        self.uncompressed_size >= MAX_U32 || self.compressed_size() >= MAX_U32
    }
}

/// Incremental raw-deflate encoder for one member.
pub struct MemberEncoder {
    encoder: DeflateEncoder<Vec<u8>>,
    hasher: crc32fast::Hasher,
    size: u64,
}

impl MemberEncoder {
    pub fn new() -> Self {
        Self {
            encoder: DeflateEncoder::new(Vec::new(), Compression::default()),
            hasher: crc32fast::Hasher::new(),
            size: 0,
        }
    }

    pub fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.hasher.update(chunk);
        self.size += chunk.len() as u64;
        self.encoder.write_all(chunk)
    }

    pub fn finish(self) -> io::Result<DeflatedMember> {
        Ok(DeflatedMember {
            crc32: self.hasher.finalize(),
            uncompressed_size: self.size,
            data: self.encoder.finish()?,
        })
    }
}

impl Default for MemberEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// MS-DOS date and time fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub date: u16,
    pub time: u16,
}

impl DosDateTime {
    /// Convert a timestamp. DOS dates start in 1980; earlier times clamp to
    /// 1980-01-01 00:00:00.
    pub fn from_naive(t: NaiveDateTime) -> Self {
        if t.year() < 1980 {
            return Self {
                date: (1 << 5) | 1,
                time: 0,
            };
        }
        let year = (t.year() - 1980).min(127) as u16;
        Self {
            date: (year << 9) | ((t.month() as u16) << 5) | t.day() as u16,
            time: ((t.hour() as u16) << 11) | ((t.minute() as u16) << 5) | (t.second() as u16 / 2),
        }
    }

    pub fn now() -> Self {
        Self::from_naive(Local::now().naive_local())
    }
}

#[derive(Debug)]
struct CentralRecord {
    name: String,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    offset: u64,
}

/// Writes zip members and the closing directory to an append-only sink.
pub struct ZipWriter<W: Write> {
    inner: W,
    offset: u64,
    records: Vec<CentralRecord>,
    modified: DosDateTime,
    finished: bool,
}

impl<W: Write> ZipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_modified(inner, DosDateTime::now())
    }

    /// Writer stamping every member with `modified`.
    pub fn with_modified(inner: W, modified: DosDateTime) -> Self {
        Self {
            inner,
            offset: 0,
            records: Vec::new(),
            modified,
            finished: false,
        }
    }

    /// Bytes written so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn entry_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn put(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    /// Write one deflated member: local header, name, then data.
    pub fn write_member(&mut self, name: &str, member: &DeflatedMember) -> io::Result<()> {
        if self.finished {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "zip archive already finished",
            ));
        }

        let offset = self.offset;
        let zip64 = member.needs_zip64();

        // Zip64 local extra carries both sizes.
        let mut extra = Vec::new();
        if zip64 {
            extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
            extra.extend_from_slice(&16u16.to_le_bytes());
            extra.extend_from_slice(&member.uncompressed_size.to_le_bytes());
            extra.extend_from_slice(&member.compressed_size().to_le_bytes());
        }

        let mut header = Vec::with_capacity(30 + name.len() + extra.len());
        header.extend_from_slice(&LOCAL_HEADER_SIG.to_le_bytes());
        header.extend_from_slice(&(if zip64 { VERSION_ZIP64 } else { VERSION_DEFLATE }).to_le_bytes());
        header.extend_from_slice(&FLAG_UTF8.to_le_bytes());
        header.extend_from_slice(&METHOD_DEFLATE.to_le_bytes());
        header.extend_from_slice(&self.modified.time.to_le_bytes());
        header.extend_from_slice(&self.modified.date.to_le_bytes());
        header.extend_from_slice(&member.crc32.to_le_bytes());
        header.extend_from_slice(&saturate_u32(member.compressed_size(), zip64).to_le_bytes());
        header.extend_from_slice(&saturate_u32(member.uncompressed_size, zip64).to_le_bytes());
        header.extend_from_slice(&(name.len() as u16).to_le_bytes());
        header.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        header.extend_from_slice(name.as_bytes());
        header.extend_from_slice(&extra);

        self.put(&header)?;
        self.put(&member.data)?;

        self.records.push(CentralRecord {
            name: name.to_string(),
            crc32: member.crc32,
            compressed_size: member.compressed_size(),
            uncompressed_size: member.uncompressed_size,
            offset,
        });
        Ok(())
    }

    /// Write the central directory and end records. No members may be
    /// written afterwards.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }

        let cd_offset = self.offset;
        let records = std::mem::take(&mut self.records);
        for record in &records {
            let header = self.central_header(record);
            self.put(&header)?;
        }
        let cd_size = self.offset - cd_offset;
        let count = records.len() as u64;
        self.records = records;

        let zip64 = count >= MAX_U16 || cd_offset >= MAX_U32 || cd_size >= MAX_U32;
        if zip64 {
            let eocd64_offset = self.offset;

            let mut record = Vec::with_capacity(56 + 20);
            record.extend_from_slice(&EOCD64_SIG.to_le_bytes());
            record.extend_from_slice(&44u64.to_le_bytes());
            record.extend_from_slice(&VERSION_MADE_BY.to_le_bytes());
            record.extend_from_slice(&VERSION_ZIP64.to_le_bytes());
            record.extend_from_slice(&0u32.to_le_bytes());
            record.extend_from_slice(&0u32.to_le_bytes());
            record.extend_from_slice(&count.to_le_bytes());
            record.extend_from_slice(&count.to_le_bytes());
            record.extend_from_slice(&cd_size.to_le_bytes());
            record.extend_from_slice(&cd_offset.to_le_bytes());

            record.extend_from_slice(&EOCD64_LOCATOR_SIG.to_le_bytes());
            record.extend_from_slice(&0u32.to_le_bytes());
            record.extend_from_slice(&eocd64_offset.to_le_bytes());
            record.extend_from_slice(&1u32.to_le_bytes());

            self.put(&record)?;
        }

        let count16 = count.min(MAX_U16) as u16;
        let mut eocd = Vec::with_capacity(22);
        eocd.extend_from_slice(&EOCD_SIG.to_le_bytes());
        eocd.extend_from_slice(&0u16.to_le_bytes());
        eocd.extend_from_slice(&0u16.to_le_bytes());
        eocd.extend_from_slice(&count16.to_le_bytes());
        eocd.extend_from_slice(&count16.to_le_bytes());
        eocd.extend_from_slice(&(cd_size.min(MAX_U32) as u32).to_le_bytes());
        eocd.extend_from_slice(&(cd_offset.min(MAX_U32) as u32).to_le_bytes());
        eocd.extend_from_slice(&0u16.to_le_bytes());
        self.put(&eocd)?;

        self.inner.flush()?;
        self.finished = true;
        Ok(())
    }

    fn central_header(&self, record: &CentralRecord) -> Vec<u8> {
        // Zip64 extra holds only the saturated fields, in this order.
        let mut zip64_fields = Vec::new();
        if record.uncompressed_size >= MAX_U32 {
            zip64_fields.extend_from_slice(&record.uncompressed_size.to_le_bytes());
        }
        if record.compressed_size >= MAX_U32 {
            zip64_fields.extend_from_slice(&record.compressed_size.to_le_bytes());
        }
        if record.offset >= MAX_U32 {
            zip64_fields.extend_from_slice(&record.offset.to_le_bytes());
        }
        let mut extra = Vec::new();
        if !zip64_fields.is_empty() {
            extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
            extra.extend_from_slice(&(zip64_fields.len() as u16).to_le_bytes());
            extra.extend_from_slice(&zip64_fields);
        }
        let needed = if extra.is_empty() {
            VERSION_DEFLATE
        } else {
            VERSION_ZIP64
        };

        let mut h = Vec::with_capacity(46 + record.name.len() + extra.len());
        h.extend_from_slice(&CENTRAL_HEADER_SIG.to_le_bytes());
        h.extend_from_slice(&VERSION_MADE_BY.to_le_bytes());
        h.extend_from_slice(&needed.to_le_bytes());
        h.extend_from_slice(&FLAG_UTF8.to_le_bytes());
        h.extend_from_slice(&METHOD_DEFLATE.to_le_bytes());
        h.extend_from_slice(&self.modified.time.to_le_bytes());
        h.extend_from_slice(&self.modified.date.to_le_bytes());
        h.extend_from_slice(&record.crc32.to_le_bytes());
        h.extend_from_slice(&(record.compressed_size.min(MAX_U32) as u32).to_le_bytes());
        h.extend_from_slice(&(record.uncompressed_size.min(MAX_U32) as u32).to_le_bytes());
        h.extend_from_slice(&(record.name.len() as u16).to_le_bytes());
        h.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        h.extend_from_slice(&0u16.to_le_bytes()); // comment length
        h.extend_from_slice(&0u16.to_le_bytes()); // disk number start
        h.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
        h.extend_from_slice(&EXTERNAL_ATTRS.to_le_bytes());
        h.extend_from_slice(&(record.offset.min(MAX_U32) as u32).to_le_bytes());
        h.extend_from_slice(record.name.as_bytes());
        h.extend_from_slice(&extra);
        h
    }
}

impl<W: Write + std::fmt::Debug> std::fmt::Debug for ZipWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipWriter")
            .field("inner", &self.inner)
            .field("offset", &self.offset)
            .field("entries", &self.records.len())
            .field("finished", &self.finished)
            .finish()
    }
}

fn saturate_u32(value: u64, zip64: bool) -> u32 {
    if zip64 {
        u32::MAX
    } else {
        value as u32
    }
}

/// Deflate a complete buffer into a member.
pub fn deflate(data: &[u8]) -> io::Result<DeflatedMember> {
    let mut encoder = MemberEncoder::new();
    encoder.write(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fixed_time() -> DosDateTime {
        DosDateTime::from_naive(
            NaiveDate::from_ymd_opt(2013, 5, 17)
                .unwrap()
                .and_hms_opt(14, 30, 9)
                .unwrap(),
        )
    }

    #[test]
    fn test_dos_date_time() {
        let t = fixed_time();
        assert_eq!(t.date, (33 << 9) | (5 << 5) | 17);
        assert_eq!(t.time, (14 << 11) | (30 << 5) | 4);

        let early = DosDateTime::from_naive(
            NaiveDate::from_ymd_opt(1970, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        );
        assert_eq!(early, DosDateTime { date: 33, time: 0 });
    }

    #[test]
    fn test_member_encoder_matches_one_shot() {
        let mut enc = MemberEncoder::new();
        enc.write(b"hello ").unwrap();
        enc.write(b"world").unwrap();
        let chunked = enc.finish().unwrap();
        let whole = deflate(b"hello world").unwrap();

        assert_eq!(chunked.crc32, crc32fast::hash(b"hello world"));
        assert_eq!(chunked.crc32, whole.crc32);
        assert_eq!(chunked.uncompressed_size, 11);
    }

    #[test]
    fn test_local_header_layout() {
        let mut zip = ZipWriter::with_modified(Vec::new(), fixed_time());
        let member = deflate(b"abc").unwrap();
        zip.write_member("n/x.csv", &member).unwrap();
        let buf = zip.get_ref();

        assert_eq!(&buf[0..4], b"PK\x03\x04");
        assert_eq!(u16::from_le_bytes([buf[6], buf[7]]), FLAG_UTF8);
        assert_eq!(u16::from_le_bytes([buf[8], buf[9]]), METHOD_DEFLATE);
        assert_eq!(
            u32::from_le_bytes([buf[14], buf[15], buf[16], buf[17]]),
            member.crc32
        );
        assert_eq!(u16::from_le_bytes([buf[26], buf[27]]), 7);
        assert_eq!(&buf[30..37], b"n/x.csv");
        assert_eq!(zip.offset(), 37 + member.compressed_size());
    }

    #[test]
    fn test_empty_archive_is_just_end_record() {
        let mut zip = ZipWriter::new(Vec::new());
        zip.finish().unwrap();
        let buf = zip.into_inner();
        assert_eq!(buf.len(), 22);
        assert_eq!(&buf[0..4], b"PK\x05\x06");
    }

    #[test]
    fn test_write_after_finish_fails() {
        let mut zip = ZipWriter::new(Vec::new());
        zip.finish().unwrap();
        zip.finish().unwrap();
        assert!(zip.write_member("late.txt", &deflate(b"").unwrap()).is_err());
    }
}
