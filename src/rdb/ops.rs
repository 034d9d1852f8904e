//! rdb/ops: mutations.
//!
//! Insert writes one record in four phases at the insertion point:
//! 1. the header with lengths and no flag set;
//! 2. the same header with HEADER_WRITTEN;
//! 3. key bytes, then value bytes;
//! 4. the header with WRITTEN.
//! A cut after 1 leaves a slot the scan steps over by one header width (the
//! body is still erased); a cut after 2 or 3 leaves a slot it steps over
//! whole. Neither is ever returned as a record.

use log::{debug, info};
use serde::Serialize;

use crate::consts::{
    RDB_FLAG_ERASED, RDB_FLAG_HEADER_WRITTEN, RDB_FLAG_WRITTEN, RDB_HDR_SIZE, RDB_MAX_DATA_LEN,
    RDB_MAX_KEY_LEN,
};
use crate::error::{Result, StorageError};
use crate::fs::Fd;
use crate::metrics::{record_rdb_delete, record_rdb_insert};

use super::gc::gc_for_bytes;
use super::iter::{advance, iter_from, read_exact, write_all, RecordIter};
use super::record::RecordHeader;
use super::registry::DbHandle;
use super::select::Selector;

#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub records: usize,
    /// Footprint of all live records.
    pub used_bytes: usize,
    /// Offset of the insertion point.
    pub tail: usize,
    pub file_size: usize,
}

fn check_lengths(key: &[u8], data: &[u8]) -> Result<()> {
    if key.is_empty() || key.len() > RDB_MAX_KEY_LEN {
        return Err(StorageError::InvalidData(format!(
            "key length {} out of range 1..={}",
            key.len(),
            RDB_MAX_KEY_LEN
        )));
    }
    if data.len() > RDB_MAX_DATA_LEN {
        return Err(StorageError::InvalidData(format!(
            "value length {} exceeds {}",
            data.len(),
            RDB_MAX_DATA_LEN
        )));
    }
    Ok(())
}

impl DbHandle<'_> {
    /// Create the backing file at its default size if it does not exist.
    pub fn create(&self) -> Result<()> {
        match self.fs.find_file(&self.def.filename) {
            Ok(_) => Ok(()),
            Err(StorageError::NotFound(_)) => {
                info!(
                    "rdb: creating {} ({} bytes)",
                    self.def.filename, self.def.default_size
                );
                let mut fd = self
                    .fs
                    .create(&self.def.filename, self.def.default_size as usize)?;
                self.fs.mark_written(&mut fd)
            }
            Err(e) => Err(e),
        }
    }

    pub fn insert(&self, key: &[u8], data: &[u8]) -> Result<()> {
        check_lengths(key, data)?;
        self.create()?;

        let file = self.fs.find_file(&self.def.filename)?;
        let mut it = iter_from(self.fs, Fd::open(&file))?;
        let mut rdkey = vec![0u8; key.len()];
        while it.valid {
            if it.key_len == key.len() {
                let n = self.read_key(&it, &mut rdkey)?;
                if n == key.len() && rdkey == key {
                    return Err(StorageError::Duplicate);
                }
            }
            advance(self.fs, &mut it)?;
        }

        let need = RDB_HDR_SIZE + key.len() + data.len();
        let mut at = it.fd;
        if at.offset() + need > at.size() {
            at = gc_for_bytes(self.fs, self.def, &at, need)?;
        }

        let mut hdr = RecordHeader::pending(key.len(), data.len());
        let mut w = at;
        write_all(self.fs, &mut w, &hdr.encode())?;

        hdr.flags.set(RDB_FLAG_HEADER_WRITTEN);
        let mut w = at;
        write_all(self.fs, &mut w, &hdr.encode())?;
        write_all(self.fs, &mut w, key)?;
        write_all(self.fs, &mut w, data)?;

        hdr.flags.set(RDB_FLAG_WRITTEN);
        let mut w = at;
        write_all(self.fs, &mut w, &hdr.encode())?;

        record_rdb_insert();
        debug!(
            "rdb: {} insert key {} bytes, value {} bytes at {}",
            self.def.filename,
            key.len(),
            data.len(),
            at.offset()
        );
        Ok(())
    }

    /// Replace the value stored under `key` (delete, then insert). Fails with
    /// `DatabaseFull` before touching anything if the new record would not
    /// fit even after compaction.
    pub fn update(&self, key: &[u8], data: &[u8]) -> Result<()> {
        check_lengths(key, data)?;
        let Some(mut it) = self.iter_start()? else {
            return Err(StorageError::KeyNotFound);
        };
        let matches = self.select(&mut it, &[Selector::key_eq(key)])?;
        if matches.is_empty() {
            return Err(StorageError::KeyNotFound);
        }

        let st = self.stats()?;
        let freed: usize = matches.iter().map(|m| m.iter.footprint()).sum();
        let need = RDB_HDR_SIZE + key.len() + data.len();
        let free = st.file_size - (st.used_bytes - freed);
        if need > free {
            return Err(StorageError::DatabaseFull {
                name: self.def.filename.clone(),
                needed: need,
                free,
            });
        }

        for m in &matches {
            self.delete(&m.iter)?;
        }
        self.insert(key, data)
    }

    /// Erase the record under `it` with a single header write.
    pub fn delete(&self, it: &RecordIter) -> Result<()> {
        if !it.valid {
            return Err(StorageError::InvalidData("iterator is not on a record".into()));
        }
        let mut fd = it.fd;
        let mut raw = [0u8; RDB_HDR_SIZE];
        read_exact(self.fs, &mut fd, &mut raw)?;
        let mut hdr = RecordHeader::decode(&raw);
        hdr.flags.set(RDB_FLAG_ERASED);

        let mut fd = it.fd;
        write_all(self.fs, &mut fd, &hdr.encode())?;
        record_rdb_delete();
        debug!("rdb: {} erased record at {}", self.def.filename, it.offset());
        Ok(())
    }

    /// Delete the record under `key`, if any.
    pub fn delete_key(&self, key: &[u8]) -> Result<()> {
        let Some(mut it) = self.iter_start()? else {
            return Err(StorageError::KeyNotFound);
        };
        let matches = self.select(&mut it, &[Selector::key_eq(key)])?;
        if matches.is_empty() {
            return Err(StorageError::KeyNotFound);
        }
        for m in &matches {
            self.delete(&m.iter)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<DbStats> {
        let file = self.fs.find_file(&self.def.filename)?;
        let mut it = iter_from(self.fs, Fd::open(&file))?;
        let mut st = DbStats {
            records: 0,
            used_bytes: 0,
            tail: 0,
            file_size: file.size as usize,
        };
        while it.valid {
            st.records += 1;
            st.used_bytes += it.footprint();
            advance(self.fs, &mut it)?;
        }
        st.tail = it.offset();
        Ok(st)
    }
}
