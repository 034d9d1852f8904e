//! fs/core: the filesystem handle and its mutable state.

use log::info;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::flash::FlashDevice;
use crate::page::{PageHeader, PageState, PageTable};

/// Mounted filesystem. All flash access goes through the inner mutex.
pub struct Fs {
    inner: Mutex<FsInner>,
    cfg: StorageConfig,
}

pub(crate) struct FsInner {
    pub(crate) dev: Box<dyn FlashDevice>,
    pub(crate) cfg: StorageConfig,
    pub(crate) table: PageTable,
    pub(crate) valid: bool,
    /// One past the last page that may hold file data.
    pub(crate) frontier: u16,
    /// Lower bound on the wear counter of any clean page.
    pub(crate) best_wear: u32,
    pub(crate) last_alloc: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct FsStats {
    pub valid: bool,
    pub pages: u16,
    pub page_size: u32,
    pub clean: usize,
    pub file_start: usize,
    pub file_cont: usize,
    pub dirty: usize,
    pub frontier: u16,
}

impl FsInner {
    fn new(dev: Box<dyn FlashDevice>, cfg: StorageConfig) -> Self {
        let pages = cfg.page_count as u16;
        Self {
            dev,
            cfg,
            table: PageTable::new(pages),
            valid: false,
            frontier: 0,
            best_wear: u32::MAX,
            last_alloc: pages - 1,
        }
    }

    #[inline]
    pub(crate) fn page_count(&self) -> u16 {
        self.cfg.page_count as u16
    }

    pub(crate) fn ensure_valid(&self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(StorageError::FilesystemInvalid)
        }
    }

    /// Erase the whole region and give every page a fresh header.
    pub(crate) fn format(&mut self) -> Result<()> {
        let n = self.page_count();
        self.valid = false;
        self.table = PageTable::new(n);
        self.frontier = 0;

        let len = self.cfg.region_len();
        self.erase_range(0, len)?;
        let fresh = PageHeader::fresh(1);
        for pg in 0..n {
            self.write_page_header(pg, &fresh)?;
        }

        self.best_wear = 1;
        self.last_alloc = n - 1;
        self.valid = true;
        info!(
            "fs: formatted {} pages of {} bytes at {:#x}",
            n, self.cfg.page_size, self.cfg.region_start
        );
        Ok(())
    }

    pub(crate) fn stats(&self) -> FsStats {
        FsStats {
            valid: self.valid,
            pages: self.page_count(),
            page_size: self.cfg.page_size,
            clean: self.table.count(PageState::Clean),
            file_start: self.table.count(PageState::FileStart),
            file_cont: self.table.count(PageState::FileCont),
            dirty: self.table.count(PageState::Dirty),
            frontier: self.frontier,
        }
    }
}

impl Fs {
    /// Mount the region described by `cfg` on `dev`.
    ///
    /// A region whose first page lacks the magic mounts as invalid rather than
    /// failing; `format` makes it usable. Device errors are returned.
    pub fn mount(dev: Box<dyn FlashDevice>, cfg: StorageConfig) -> Result<Self> {
        cfg.validate()?;
        let mut inner = FsInner::new(dev, cfg.clone());
        inner.mount()?;
        Ok(Self {
            inner: Mutex::new(inner),
            cfg,
        })
    }

    /// Poisoning is ignored: the state can be rebuilt from flash by `remount`.
    pub(crate) fn lock(&self) -> MutexGuard<'_, FsInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &StorageConfig {
        &self.cfg
    }

    pub fn is_valid(&self) -> bool {
        self.lock().valid
    }

    /// Erase and re-initialize the region. On failure the filesystem stays
    /// invalid and the caller is expected to retry.
    pub fn format(&self) -> Result<()> {
        self.lock().format()
    }

    /// Re-run mount-time classification and repair.
    pub fn remount(&self) -> Result<()> {
        self.lock().mount()
    }

    pub fn stats(&self) -> FsStats {
        self.lock().stats()
    }

    pub fn sync(&self) -> Result<()> {
        self.lock().dev.sync()
    }

    /// Give the device back (e.g. to remount it with another configuration).
    pub fn into_device(self) -> Box<dyn FlashDevice> {
        self.inner
            .into_inner()
            .unwrap_or_else(|e| e.into_inner())
            .dev
    }
}
