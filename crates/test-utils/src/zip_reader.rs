//! A minimal zip reader for verifying streamed archives in tests.
//!
//! Reads the end of central directory record (and the zip64 records when
//! present), walks the central directory, cross-checks each local header,
//! inflates the member data and verifies its CRC-32.

use std::io::Read;

use flate2::read::DeflateDecoder;

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;
const EOCD64_SIG: u32 = 0x0606_4b50;
const EOCD64_LOCATOR_SIG: u32 = 0x0706_4b50;
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// One extracted archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipMember {
    pub name: String,
    pub data: Vec<u8>,
    pub method: u16,
}

#[derive(Debug)]
pub enum ZipReadError {
    Truncated(&'static str),
    BadSignature { at: usize, expected: u32 },
    Mismatch(String),
    Io(std::io::Error),
}

impl std::fmt::Display for ZipReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZipReadError::Truncated(what) => write!(f, "archive truncated reading {}", what),
            ZipReadError::BadSignature { at, expected } => {
                write!(f, "expected signature {:#010x} at offset {}", expected, at)
            }
            ZipReadError::Mismatch(msg) => write!(f, "{}", msg),
            ZipReadError::Io(e) => write!(f, "inflate failed: {}", e),
        }
    }
}

impl std::error::Error for ZipReadError {}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], ZipReadError> {
        let end = self.pos.checked_add(n).ok_or(ZipReadError::Truncated(what))?;
        let slice = self.buf.get(self.pos..end).ok_or(ZipReadError::Truncated(what))?;
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, ZipReadError> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, ZipReadError> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self, what: &'static str) -> Result<u64, ZipReadError> {
        let b = self.take(8, what)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_le_bytes(a))
    }

    fn expect_sig(&mut self, sig: u32) -> Result<(), ZipReadError> {
        let at = self.pos;
        if self.u32("signature")? != sig {
            return Err(ZipReadError::BadSignature { at, expected: sig });
        }
        Ok(())
    }
}

struct Directory {
    entries: u64,
    offset: u64,
}

fn find_directory(buf: &[u8]) -> Result<Directory, ZipReadError> {
    if buf.len() < 22 {
        return Err(ZipReadError::Truncated("end of central directory"));
    }
    let eocd_pos = (0..=buf.len() - 22)
        .rev()
        .find(|&i| buf[i..i + 4] == EOCD_SIG.to_le_bytes())
        .ok_or(ZipReadError::Truncated("end of central directory"))?;

    let mut c = Cursor::at(buf, eocd_pos + 4);
    let _disk = c.u16("eocd disk")?;
    let _cd_disk = c.u16("eocd cd disk")?;
    let _disk_entries = c.u16("eocd disk entries")?;
    let entries = c.u16("eocd entries")?;
    let _size = c.u32("eocd size")?;
    let offset = c.u32("eocd offset")?;

    if entries != u16::MAX && offset != u32::MAX {
        return Ok(Directory {
            entries: entries as u64,
            offset: offset as u64,
        });
    }

    // Zip64: locator sits immediately before the classic record.
    let locator_pos = eocd_pos
        .checked_sub(20)
        .ok_or(ZipReadError::Truncated("zip64 locator"))?;
    let mut c = Cursor::at(buf, locator_pos);
    c.expect_sig(EOCD64_LOCATOR_SIG)?;
    let _disk = c.u32("locator disk")?;
    let eocd64_pos = c.u64("locator offset")? as usize;

    let mut c = Cursor::at(buf, eocd64_pos);
    c.expect_sig(EOCD64_SIG)?;
    let _record_size = c.u64("eocd64 size")?;
    let _made_by = c.u16("eocd64 made by")?;
    let _needed = c.u16("eocd64 needed")?;
    let _disk = c.u32("eocd64 disk")?;
    let _cd_disk = c.u32("eocd64 cd disk")?;
    let _disk_entries = c.u64("eocd64 disk entries")?;
    let entries = c.u64("eocd64 entries")?;
    let _size = c.u64("eocd64 size")?;
    let offset = c.u64("eocd64 offset")?;

    Ok(Directory { entries, offset })
}

/// Parse a complete archive held in memory.
pub fn read_zip(buf: &[u8]) -> Result<Vec<ZipMember>, ZipReadError> {
    let dir = find_directory(buf)?;
    let mut members = Vec::with_capacity(dir.entries as usize);
    let mut c = Cursor::at(buf, dir.offset as usize);

    for _ in 0..dir.entries {
        c.expect_sig(CENTRAL_HEADER_SIG)?;
        let _made_by = c.u16("made by")?;
        let _needed = c.u16("needed")?;
        let _flags = c.u16("flags")?;
        let method = c.u16("method")?;
        let _time = c.u16("time")?;
        let _date = c.u16("date")?;
        let crc = c.u32("crc")?;
        let mut compressed = c.u32("compressed size")? as u64;
        let mut uncompressed = c.u32("uncompressed size")? as u64;
        let name_len = c.u16("name length")? as usize;
        let extra_len = c.u16("extra length")? as usize;
        let comment_len = c.u16("comment length")? as usize;
        let _disk = c.u16("disk start")?;
        let _internal = c.u16("internal attrs")?;
        let _external = c.u32("external attrs")?;
        let mut local_offset = c.u32("local offset")? as u64;
        let name = String::from_utf8_lossy(c.take(name_len, "name")?).into_owned();
        let extra = c.take(extra_len, "extra")?;
        c.take(comment_len, "comment")?;

        // Zip64 extra holds only the fields saturated in the header, in order.
        let mut e = Cursor::at(extra, 0);
        while e.pos + 4 <= extra.len() {
            let id = e.u16("extra id")?;
            let len = e.u16("extra len")? as usize;
            let body = e.take(len, "extra body")?;
            if id == ZIP64_EXTRA_ID {
                let mut z = Cursor::at(body, 0);
                if uncompressed == u32::MAX as u64 {
                    uncompressed = z.u64("zip64 uncompressed")?;
                }
                if compressed == u32::MAX as u64 {
                    compressed = z.u64("zip64 compressed")?;
                }
                if local_offset == u32::MAX as u64 {
                    local_offset = z.u64("zip64 offset")?;
                }
            }
        }

        let mut l = Cursor::at(buf, local_offset as usize);
        l.expect_sig(LOCAL_HEADER_SIG)?;
        l.take(22, "local header")?;
        let local_name_len = l.u16("local name length")? as usize;
        let local_extra_len = l.u16("local extra length")? as usize;
        let local_name = String::from_utf8_lossy(l.take(local_name_len, "local name")?);
        if local_name != name {
            return Err(ZipReadError::Mismatch(format!(
                "local header name '{}' != central name '{}'",
                local_name, name
            )));
        }
        l.take(local_extra_len, "local extra")?;
        let raw = l.take(compressed as usize, "member data")?;

        let data = match method {
            0 => raw.to_vec(),
            8 => {
                let mut out = Vec::with_capacity(uncompressed as usize);
                DeflateDecoder::new(raw)
                    .read_to_end(&mut out)
                    .map_err(ZipReadError::Io)?;
                out
            }
            other => {
                return Err(ZipReadError::Mismatch(format!(
                    "unsupported compression method {} for '{}'",
                    other, name
                )))
            }
        };

        if data.len() as u64 != uncompressed {
            return Err(ZipReadError::Mismatch(format!(
                "'{}' inflated to {} bytes, header says {}",
                name,
                data.len(),
                uncompressed
            )));
        }
        if crc32fast::hash(&data) != crc {
            return Err(ZipReadError::Mismatch(format!("CRC mismatch for '{}'", name)));
        }

        members.push(ZipMember { name, data, method });
    }

    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_archive() {
        // End of central directory record with zero entries.
        let mut buf = Vec::new();
        buf.extend_from_slice(&EOCD_SIG.to_le_bytes());
        buf.extend_from_slice(&[0u8; 18]);
        assert!(read_zip(&buf).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(read_zip(b"not a zip file at all, definitely not").is_err());
        assert!(read_zip(b"PK").is_err());
    }
}
