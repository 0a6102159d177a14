//! Bounds-checked little-endian reader used by every decoder.
//!
//! A plain `File` happily seeks past its end, so the cursor tracks the source
//! length itself and turns any seek or read beyond it into
//! [`TdfError::CorruptFile`].
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Result, TdfError};
use crate::options::LabelEncoding;

/// Width of every fixed text field (labels).
pub const LABEL_LEN: usize = 256;

/// Size of the reserved 32-bit words interleaved with counts.
pub const RESERVED_WORD: i64 = 4;

pub struct ByteCursor<R> {
    inner: R,
    pos: u64,
    len: u64,
}

impl ByteCursor<BufReader<File>> {
    /// Open a scoped read-only handle on `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { inner: BufReader::new(file), pos: 0, len })
    }
}

impl<R: Read + Seek> ByteCursor<R> {
    /// Wrap an arbitrary source, measuring its length once.
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, pos: 0, len })
    }

    pub fn position(&self) -> u64 { self.pos }
    pub fn len(&self) -> u64 { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }
    pub fn remaining(&self) -> u64 { self.len - self.pos }

    fn corrupt(&self, offset: u64, needed: u64) -> TdfError {
        TdfError::CorruptFile { offset: offset as i64, needed, file_len: self.len }
    }

    /// Fail unless `needed` more bytes are left; nothing is consumed.
    pub fn ensure(&self, needed: u64) -> Result<()> {
        if needed > self.remaining() {
            return Err(self.corrupt(self.pos, needed));
        }
        Ok(())
    }

    /// Absolute seek; the target must lie within the file.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        if offset > self.len {
            return Err(self.corrupt(offset, 0));
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        self.pos = offset;
        Ok(())
    }

    /// Seek to a block offset taken from a directory descriptor.
    pub fn seek_block(&mut self, offset: i32) -> Result<()> {
        match u64::try_from(offset) {
            Ok(o) => self.seek_to(o),
            Err(_) => Err(TdfError::CorruptFile { offset: offset.into(), needed: 0, file_len: self.len }),
        }
    }

    /// Relative seek from the current position.
    pub fn skip(&mut self, delta: i64) -> Result<()> {
        let target = self.pos as i128 + delta as i128;
        if target < 0 || target > self.len as i128 {
            return Err(self.corrupt(self.pos, delta.unsigned_abs()));
        }
        self.seek_to(target as u64)
    }

    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let needed = buf.len() as u64;
        if needed > self.remaining() {
            return Err(self.corrupt(self.pos, needed));
        }
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => self.corrupt(self.pos, needed),
            _ => TdfError::Io(e),
        })?;
        self.pos += needed;
        Ok(())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_bytes(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u32(&mut self) -> Result<u32> { Ok(u32::from_le_bytes(self.array()?)) }
    pub fn read_i32(&mut self) -> Result<i32> { Ok(i32::from_le_bytes(self.array()?)) }
    pub fn read_i16(&mut self) -> Result<i16> { Ok(i16::from_le_bytes(self.array()?)) }
    pub fn read_f32(&mut self) -> Result<f32> { Ok(f32::from_le_bytes(self.array()?)) }

    /// Read a count field, rejecting negative values.
    pub fn read_count(&mut self, what: &'static str) -> Result<usize> {
        let offset = self.pos;
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| TdfError::InvalidCount { what, value, offset })
    }

    /// Read `n` consecutive values with `read`, checking up front that they fit.
    fn read_many<T>(&mut self, n: usize, width: u64, read: fn(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        self.ensure((n as u64).saturating_mul(width))?;
        (0..n).map(|_| read(&mut *self)).collect()
    }

    pub fn read_f32s(&mut self, n: usize) -> Result<Vec<f32>> { self.read_many(n, 4, Self::read_f32) }
    pub fn read_i32s(&mut self, n: usize) -> Result<Vec<i32>> { self.read_many(n, 4, Self::read_i32) }
    pub fn read_i16s(&mut self, n: usize) -> Result<Vec<i16>> { self.read_many(n, 2, Self::read_i16) }

    /// Read a fixed-width label field.
    pub fn read_label(&mut self, encoding: LabelEncoding) -> Result<String> {
        let raw: [u8; LABEL_LEN] = self.array()?;
        Ok(encoding.decode(&raw))
    }
}
