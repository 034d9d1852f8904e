//! rdb/registry: database ids, their backing files and locks.
//!
//! `open` waits on the database's lock with no timeout. A caller that holds a
//! handle indefinitely starves every other opener of that id.

use log::debug;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{DatabaseDef, RdbConfig};
use crate::error::{Result, StorageError};
use crate::fs::Fs;

struct DbSlot {
    def: DatabaseDef,
    lock: Mutex<()>,
}

/// Registry of record databases over one filesystem.
pub struct Rdb {
    fs: Arc<Fs>,
    slots: Vec<DbSlot>,
}

/// Exclusive access to one database for as long as it lives.
pub struct DbHandle<'a> {
    pub(crate) fs: &'a Fs,
    pub(crate) def: &'a DatabaseDef,
    _guard: MutexGuard<'a, ()>,
}

impl Rdb {
    pub fn new(fs: Arc<Fs>, cfg: RdbConfig) -> Result<Self> {
        cfg.validate()?;
        let slots = cfg
            .databases
            .into_iter()
            .map(|def| DbSlot {
                def,
                lock: Mutex::new(()),
            })
            .collect();
        Ok(Self { fs, slots })
    }

    pub fn fs(&self) -> &Arc<Fs> {
        &self.fs
    }

    pub fn databases(&self) -> impl Iterator<Item = &DatabaseDef> {
        self.slots.iter().map(|s| &s.def)
    }

    /// Lock database `id`, blocking until it is free.
    pub fn open(&self, id: u16) -> Result<DbHandle<'_>> {
        let slot = self
            .slots
            .iter()
            .find(|s| s.def.id == id)
            .ok_or(StorageError::InvalidDatabaseId(id))?;
        let guard = slot.lock.lock().unwrap_or_else(|e| e.into_inner());
        debug!("rdb: opened {} ({})", id, slot.def.filename);
        Ok(DbHandle {
            fs: &self.fs,
            def: &slot.def,
            _guard: guard,
        })
    }

    /// Release a handle. Dropping it has the same effect.
    pub fn close(handle: DbHandle<'_>) {
        drop(handle);
    }
}

impl<'a> DbHandle<'a> {
    pub fn id(&self) -> u16 {
        self.def.id
    }

    pub fn filename(&self) -> &str {
        &self.def.filename
    }

    pub fn default_size(&self) -> u32 {
        self.def.default_size
    }

    pub fn fs(&self) -> &'a Fs {
        self.fs
    }
}

impl Drop for DbHandle<'_> {
    fn drop(&mut self) {
        debug!("rdb: closed {}", self.def.id);
    }
}
