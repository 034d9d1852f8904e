//! rebblestore: crash-consistent storage for NOR flash.
//!
//! Two layers:
//! - `fs`: a page-chained file system over a fixed flash region. Pages carry
//!   active-low flags and wear counters; mount classifies every page and
//!   finishes whatever a power cut interrupted.
//! - `rdb`: append-only key/value record databases, one fs file each, with
//!   filter/projection queries and compaction.
//!
//! Flash access goes through the `flash::FlashDevice` trait; `MemFlash`
//! simulates a part in memory (with power-loss injection), `ImageFlash` maps a
//! dump file.

// Shared building blocks
pub mod config;
pub mod consts;
pub mod error;
pub mod flag;
pub mod metrics;

pub mod flash; // src/flash/{mod,mem,image}.rs
pub mod page;  // src/page/{mod,checksum,header,file_header,table}.rs
pub mod fs;    // src/fs/{mod,core,io,mount,alloc,file,create,doctor}.rs
pub mod rdb;   // src/rdb/{mod,record,registry,iter,ops,select,gc}.rs

// Convenience re-exports
pub use config::{DatabaseDef, RdbConfig, StorageConfig};
pub use error::{BlobStatus, Result, StorageError};
pub use flash::{FlashDevice, ImageFlash, MemFlash};
pub use fs::{Fd, File, Fs, Whence};
pub use rdb::{DbHandle, Rdb, RecordIter, SelectResult, Selector};
