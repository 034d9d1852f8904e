//! Error taxonomy for the storage engine and the status codes handed to
//! protocol-facing callers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    // ----- device-level -----
    #[error("flash {op} failed at {addr:#x} (+{len}): {reason}")]
    Device {
        op: &'static str,
        addr: u32,
        len: usize,
        reason: String,
    },

    #[error("short {op}: expected {expected} bytes, got {got}")]
    ShortIo {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    // ----- structural -----
    #[error("page {page} has bad magic {found:#06x}")]
    BadMagic { page: u16, found: u16 },

    #[error("corrupt page chain: page {page} links to {next}")]
    CorruptChain { page: u16, next: u16 },

    #[error("filesystem is not mounted or was found invalid")]
    FilesystemInvalid,

    // ----- capacity -----
    #[error("not enough free pages: need {needed}, have {available}")]
    NoSpace { needed: usize, available: usize },

    #[error("database {name} is full: need {needed} bytes, {free} reclaimable")]
    DatabaseFull {
        name: String,
        needed: usize,
        free: usize,
    },

    // ----- logical -----
    #[error("key already exists")]
    Duplicate,

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("key does not exist")]
    KeyNotFound,

    #[error("file '{0}' not found")]
    NotFound(String),

    #[error("file '{0}' already exists")]
    FileExists(String),

    #[error("file name too long ({len} > {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("unknown database id {0}")]
    InvalidDatabaseId(u16),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StorageError {
    pub(crate) fn device(op: &'static str, addr: u32, len: usize, reason: impl Into<String>) -> Self {
        StorageError::Device {
            op,
            addr,
            len,
            reason: reason.into(),
        }
    }

    /// Status code reported to the calling subsystem.
    pub fn status(&self) -> BlobStatus {
        match self {
            StorageError::Duplicate | StorageError::InvalidData(_) => BlobStatus::InvalidData,
            StorageError::KeyNotFound | StorageError::NotFound(_) => BlobStatus::KeyDoesNotExist,
            StorageError::NoSpace { .. } | StorageError::DatabaseFull { .. } => {
                BlobStatus::DatabaseFull
            }
            StorageError::InvalidDatabaseId(_) => BlobStatus::InvalidDatabaseId,
            StorageError::FileExists(_) | StorageError::NameTooLong { .. } => {
                BlobStatus::InvalidOperation
            }
            StorageError::Device { .. }
            | StorageError::ShortIo { .. }
            | StorageError::BadMagic { .. }
            | StorageError::CorruptChain { .. }
            | StorageError::FilesystemInvalid
            | StorageError::InvalidConfig(_) => BlobStatus::GeneralFailure,
        }
    }
}

/// Blob database status codes as carried over the air.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlobStatus {
    Success = 0x01,
    GeneralFailure = 0x02,
    InvalidOperation = 0x03,
    InvalidDatabaseId = 0x04,
    InvalidData = 0x05,
    KeyDoesNotExist = 0x06,
    DatabaseFull = 0x07,
    DataStale = 0x08,
    NotSupported = 0x09,
    Locked = 0x0A,
    TryLater = 0x0B,
}

impl BlobStatus {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Collapse an operation result into its wire status.
    pub fn of<T>(res: &Result<T>) -> BlobStatus {
        match res {
            Ok(_) => BlobStatus::Success,
            Err(e) => e.status(),
        }
    }
}
