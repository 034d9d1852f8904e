//! flash/image: a flash dump on disk, mapped read-write.
//!
//! The image is addressed with absolute flash addresses (a full 16 MiB dump
//! keeps the filesystem at its real offset). The file is held under an
//! exclusive fs2 advisory lock for as long as the device is open.

use fs2::FileExt;
use log::debug;
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use super::{program, span, FlashDevice};
use crate::error::{Result, StorageError};

pub struct ImageFlash {
    file: File,
    map: MmapMut,
    path: PathBuf,
}

fn io_err(op: &'static str, path: &Path, e: std::io::Error) -> StorageError {
    StorageError::device(op, 0, 0, format!("{}: {}", path.display(), e))
}

impl ImageFlash {
    /// Open an existing image.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| io_err("open", path, e))?;
        Self::map(file, path)
    }

    /// Create a new, fully erased image of `len` bytes. Fails if it exists.
    pub fn create(path: &Path, len: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| io_err("create", path, e))?;
        file.set_len(len as u64)
            .map_err(|e| io_err("set_len", path, e))?;
        let mut dev = Self::map(file, path)?;
        dev.map.fill(0xFF);
        dev.sync()?;
        debug!("image: created {} ({} bytes)", path.display(), len);
        Ok(dev)
    }

    /// Open `path`, creating an erased image of `len` bytes if it is missing.
    pub fn open_or_create(path: &Path, len: u32) -> Result<Self> {
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path, len)
        }
    }

    fn map(file: File, path: &Path) -> Result<Self> {
        file.try_lock_exclusive()
            .map_err(|e| io_err("lock", path, e))?;
        let map = unsafe {
            MmapOptions::new()
                .map_mut(&file)
                .map_err(|e| io_err("mmap", path, e))?
        };
        Ok(Self {
            file,
            map,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl FlashDevice for ImageFlash {
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let r = span("read", 0, self.map.len(), addr, buf.len())?;
        buf.copy_from_slice(&self.map[r]);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let r = span("write", 0, self.map.len(), addr, data.len())?;
        program(&mut self.map[r], data);
        Ok(())
    }

    fn erase(&mut self, addr: u32, len: u32) -> Result<()> {
        let r = span("erase", 0, self.map.len(), addr, len as usize)?;
        self.map[r].fill(0xFF);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.map
            .flush()
            .map_err(|e| io_err("flush", &self.path, e))
    }
}

impl Drop for ImageFlash {
    fn drop(&mut self) {
        // nothing to report errors to on drop
        let _ = self.map.flush();
        let _ = self.file.unlock();
    }
}
