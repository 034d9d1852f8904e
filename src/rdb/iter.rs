//! rdb/iter: the validity scan and record iteration.

use log::warn;

use crate::consts::RDB_HDR_SIZE;
use crate::error::{Result, StorageError};
use crate::fs::{Fd, Fs, Whence};
use crate::metrics::record_partial_header_skipped;

use super::record::{RecordHeader, RecordState};
use super::registry::DbHandle;

/// Position of a record header inside a database file.
///
/// When `is_valid()` is false the cursor sits at the insertion point (or at
/// end of file) instead.
#[derive(Debug, Clone, Copy)]
pub struct RecordIter {
    pub(crate) fd: Fd,
    pub(crate) key_len: usize,
    pub(crate) data_len: usize,
    pub(crate) valid: bool,
}

impl RecordIter {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[inline]
    pub fn key_len(&self) -> usize {
        self.key_len
    }

    #[inline]
    pub fn data_len(&self) -> usize {
        self.data_len
    }

    /// Header plus key plus value.
    #[inline]
    pub fn footprint(&self) -> usize {
        RDB_HDR_SIZE + self.key_len + self.data_len
    }

    /// Byte offset of the header within the database file.
    #[inline]
    pub fn offset(&self) -> usize {
        self.fd.offset()
    }
}

/// Leave `fd` on the next valid record header and return it, or on the first
/// empty slot (or end of file) and return `None`. With `skip_current` the
/// record under `fd` is stepped over first.
pub(crate) fn seek_valid(fs: &Fs, fd: &mut Fd, skip_current: bool) -> Result<Option<RecordHeader>> {
    let mut cur = *fd;
    let mut skip = skip_current;
    loop {
        *fd = cur;
        let mut raw = [0u8; RDB_HDR_SIZE];
        if fs.read(&mut cur, &mut raw)? < RDB_HDR_SIZE {
            return Ok(None);
        }
        let hdr = RecordHeader::decode(&raw);
        match hdr.state() {
            RecordState::Empty => return Ok(None),
            RecordState::HeaderWriting => {
                record_partial_header_skipped();
            }
            RecordState::Erased | RecordState::HeaderWritten => {
                fs.seek(&mut cur, hdr.body_len() as i64, Whence::Cur)?;
            }
            RecordState::Written if skip => {
                skip = false;
                fs.seek(&mut cur, hdr.body_len() as i64, Whence::Cur)?;
            }
            RecordState::Written => return Ok(Some(hdr)),
        }
    }
}

pub(crate) fn iter_from(fs: &Fs, fd: Fd) -> Result<RecordIter> {
    let mut it = RecordIter {
        fd,
        key_len: 0,
        data_len: 0,
        valid: false,
    };
    load(fs, &mut it, false)?;
    Ok(it)
}

pub(crate) fn advance(fs: &Fs, it: &mut RecordIter) -> Result<bool> {
    load(fs, it, true)
}

fn load(fs: &Fs, it: &mut RecordIter, skip_current: bool) -> Result<bool> {
    match seek_valid(fs, &mut it.fd, skip_current)? {
        Some(h) => {
            it.key_len = h.key_len as usize;
            it.data_len = h.data_len as usize;
            it.valid = true;
        }
        None => {
            it.key_len = 0;
            it.data_len = 0;
            it.valid = false;
        }
    }
    Ok(it.valid)
}

/// Read exactly `buf.len()` bytes or fail.
pub(crate) fn read_exact(fs: &Fs, fd: &mut Fd, buf: &mut [u8]) -> Result<()> {
    let got = fs.read(fd, buf)?;
    if got < buf.len() {
        return Err(StorageError::ShortIo {
            op: "read",
            expected: buf.len(),
            got,
        });
    }
    Ok(())
}

/// Write exactly `data.len()` bytes or fail.
pub(crate) fn write_all(fs: &Fs, fd: &mut Fd, data: &[u8]) -> Result<()> {
    let got = fs.write(fd, data)?;
    if got < data.len() {
        return Err(StorageError::ShortIo {
            op: "write",
            expected: data.len(),
            got,
        });
    }
    Ok(())
}

impl DbHandle<'_> {
    /// First valid record, or `None` if the database is empty or has no file yet.
    pub fn iter_start(&self) -> Result<Option<RecordIter>> {
        let file = match self.fs.find_file(&self.def.filename) {
            Ok(f) => f,
            Err(StorageError::NotFound(_)) => {
                warn!("rdb: no file for database {}", self.def.filename);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let it = iter_from(self.fs, Fd::open(&file))?;
        Ok(it.valid.then_some(it))
    }

    /// Step to the next valid record. Returns false (and leaves `it` invalid) at the end.
    pub fn iter_next(&self, it: &mut RecordIter) -> Result<bool> {
        advance(self.fs, it)
    }

    /// Copy the record's key into `buf`; returns the number of bytes read.
    pub fn read_key(&self, it: &RecordIter, buf: &mut [u8]) -> Result<usize> {
        let mut fd = it.fd;
        self.fs.seek(&mut fd, RDB_HDR_SIZE as i64, Whence::Cur)?;
        let n = buf.len().min(it.key_len);
        self.fs.read(&mut fd, &mut buf[..n])
    }

    /// Copy up to `buf.len()` value bytes starting at `ofs`; 0 if `ofs` is past the value.
    pub fn read_data(&self, it: &RecordIter, ofs: usize, buf: &mut [u8]) -> Result<usize> {
        if ofs >= it.data_len {
            return Ok(0);
        }
        let n = buf.len().min(it.data_len - ofs);
        let mut fd = it.fd;
        self.fs
            .seek(&mut fd, (RDB_HDR_SIZE + it.key_len + ofs) as i64, Whence::Cur)?;
        self.fs.read(&mut fd, &mut buf[..n])
    }

    pub fn key(&self, it: &RecordIter) -> Result<Vec<u8>> {
        let mut key = vec![0u8; it.key_len];
        let n = self.read_key(it, &mut key)?;
        key.truncate(n);
        Ok(key)
    }

    pub fn value(&self, it: &RecordIter) -> Result<Vec<u8>> {
        let mut val = vec![0u8; it.data_len];
        let n = self.read_data(it, 0, &mut val)?;
        val.truncate(n);
        Ok(val)
    }
}
