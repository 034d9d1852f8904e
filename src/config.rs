//! Centralized configuration: flash geometry and the record database registry.
//!
//! - `StorageConfig::default()` is the snowy-family layout (FS region at 4 MiB,
//!   8 KiB pages up to the end of a 16 MiB part, 32 KiB erase sectors).
//! - `StorageConfig::from_env()` overrides fields from RBFS_* variables.
//! - `RdbConfig::default()` registers the firmware's built-in databases.

use crate::error::{Result, StorageError};
use crate::consts::{FILE_HDR_SIZE, MAX_FILENAME_LEN, NO_PAGE, PAGE_HDR_SIZE, RDB_HDR_SIZE};

/// Geometry of the filesystem region on the flash part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    /// Absolute flash address of page 0.
    /// Env: RBFS_REGION_START (decimal or 0x-hex)
    pub region_start: u32,

    /// Page size in bytes.
    /// Env: RBFS_PAGE_SIZE
    pub page_size: u32,

    /// Number of pages in the region.
    /// Env: RBFS_PAGE_COUNT
    pub page_count: u32,

    /// Erase sector size in bytes (multiple of page_size).
    /// Env: RBFS_ERASE_SIZE
    pub erase_size: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            region_start: 0x40_0000,
            page_size: 0x2000,
            page_count: (0x100_0000 - 0x40_0000) / 0x2000,
            erase_size: 32 * 1024,
        }
    }
}

/// Decimal or `0x`-prefixed hex.
pub fn parse_u32(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        s.parse::<u32>().ok()
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(n) = std::env::var("RBFS_REGION_START").ok().and_then(|v| parse_u32(&v)) {
            cfg.region_start = n;
        }
        if let Some(n) = std::env::var("RBFS_PAGE_SIZE").ok().and_then(|v| parse_u32(&v)) {
            cfg.page_size = n;
        }
        if let Some(n) = std::env::var("RBFS_PAGE_COUNT").ok().and_then(|v| parse_u32(&v)) {
            cfg.page_count = n;
        }
        if let Some(n) = std::env::var("RBFS_ERASE_SIZE").ok().and_then(|v| parse_u32(&v)) {
            cfg.erase_size = n;
        }

        cfg
    }

    pub fn with_region_start(mut self, addr: u32) -> Self {
        self.region_start = addr;
        self
    }

    pub fn with_page_size(mut self, bytes: u32) -> Self {
        self.page_size = bytes;
        self
    }

    pub fn with_page_count(mut self, pages: u32) -> Self {
        self.page_count = pages;
        self
    }

    pub fn with_erase_size(mut self, bytes: u32) -> Self {
        self.erase_size = bytes;
        self
    }

    /// Check that the geometry can hold the on-flash structures.
    pub fn validate(&self) -> Result<()> {
        let ps = self.page_size as usize;
        if ps < FILE_HDR_SIZE + MAX_FILENAME_LEN + RDB_HDR_SIZE {
            return Err(StorageError::InvalidConfig(format!(
                "page_size {} too small for a file header",
                ps
            )));
        }
        if self.page_count == 0 || self.page_count >= NO_PAGE as u32 {
            return Err(StorageError::InvalidConfig(format!(
                "page_count {} out of range 1..{}",
                self.page_count, NO_PAGE
            )));
        }
        if self.erase_size == 0 || self.erase_size % self.page_size != 0 {
            return Err(StorageError::InvalidConfig(format!(
                "erase_size {} is not a multiple of page_size {}",
                self.erase_size, self.page_size
            )));
        }
        if self.page_count % self.pages_per_sector() != 0 {
            return Err(StorageError::InvalidConfig(format!(
                "page_count {} is not a whole number of {}-page sectors",
                self.page_count,
                self.pages_per_sector()
            )));
        }
        let end = self.region_start as u64 + self.region_len() as u64;
        if end > u32::MAX as u64 + 1 {
            return Err(StorageError::InvalidConfig(
                "filesystem region exceeds 32-bit address space".into(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn pages_per_sector(&self) -> u32 {
        self.erase_size / self.page_size
    }

    #[inline]
    pub fn region_len(&self) -> u32 {
        self.page_size.saturating_mul(self.page_count)
    }

    /// Usable data bytes of a continuation page.
    #[inline]
    pub fn page_payload(&self) -> usize {
        self.page_size as usize - PAGE_HDR_SIZE
    }

    /// Absolute address of `ofs` within page `pg`.
    #[inline]
    pub fn page_addr(&self, pg: u16, ofs: usize) -> u32 {
        self.region_start + pg as u32 * self.page_size + ofs as u32
    }
}

// -------- RDB registry --------

pub const RDB_ID_TEST: u16 = 0;
pub const RDB_ID_PIN: u16 = 1;
pub const RDB_ID_APP: u16 = 2;
pub const RDB_ID_REMINDER: u16 = 3;
pub const RDB_ID_NOTIFICATION: u16 = 4;
pub const RDB_ID_APP_GLANCE: u16 = 11;
pub const RDB_ID_APP_PERSIST: u16 = 16;
pub const RDB_ID_BLUETOOTH: u16 = 128;
pub const RDB_ID_PREFS: u16 = 129;

/// One registered database: immutable after registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseDef {
    pub id: u16,
    pub filename: String,
    /// Size the backing file is created (and re-created by GC) with.
    pub default_size: u32,
}

impl DatabaseDef {
    pub fn new<S: Into<String>>(id: u16, filename: S, default_size: u32) -> Self {
        Self {
            id,
            filename: filename.into(),
            default_size,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RdbConfig {
    pub databases: Vec<DatabaseDef>,
}

impl Default for RdbConfig {
    fn default() -> Self {
        Self {
            databases: vec![
                DatabaseDef::new(RDB_ID_TEST, "rebble/rdbtest", 1024),
                DatabaseDef::new(RDB_ID_NOTIFICATION, "rebble/notifstr", 16384),
                DatabaseDef::new(RDB_ID_APP, "rebble/appdb", 16384),
                DatabaseDef::new(RDB_ID_APP_PERSIST, "rebble/apppersistdb", 16384),
            ],
        }
    }
}

impl RdbConfig {
    pub fn empty() -> Self {
        Self {
            databases: Vec::new(),
        }
    }

    /// Register (or re-register) a database id.
    pub fn with_database(mut self, def: DatabaseDef) -> Self {
        self.databases.retain(|d| d.id != def.id);
        self.databases.push(def);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (i, d) in self.databases.iter().enumerate() {
            if d.filename.is_empty() || d.filename.len() > MAX_FILENAME_LEN {
                return Err(StorageError::InvalidConfig(format!(
                    "database {} has invalid filename '{}'",
                    d.id, d.filename
                )));
            }
            if (d.default_size as usize) < RDB_HDR_SIZE {
                return Err(StorageError::InvalidConfig(format!(
                    "database {} default size {} too small",
                    d.id, d.default_size
                )));
            }
            if self.databases[..i].iter().any(|o| o.filename == d.filename) {
                return Err(StorageError::InvalidConfig(format!(
                    "database file '{}' registered twice",
                    d.filename
                )));
            }
        }
        Ok(())
    }
}
