//! Lightweight global metrics.
//!
//! Process-wide atomic counters for:
//! - flash device traffic (as issued by the filesystem)
//! - filesystem lifecycle (files, mount repairs, sector reclaims)
//! - record database (inserts, deletes, GC)

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ----- Flash -----
static FLASH_READS: AtomicU64 = AtomicU64::new(0);
static FLASH_BYTES_READ: AtomicU64 = AtomicU64::new(0);
static FLASH_WRITES: AtomicU64 = AtomicU64::new(0);
static FLASH_BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static FLASH_ERASES: AtomicU64 = AtomicU64::new(0);

// ----- Filesystem -----
static FS_FILES_CREATED: AtomicU64 = AtomicU64::new(0);
static FS_FILES_DELETED: AtomicU64 = AtomicU64::new(0);
static FS_MOUNT_REPAIRS: AtomicU64 = AtomicU64::new(0);
static FS_ORPHANS_SWEPT: AtomicU64 = AtomicU64::new(0);
static FS_SECTORS_RECLAIMED: AtomicU64 = AtomicU64::new(0);

// ----- RDB -----
static RDB_INSERTS: AtomicU64 = AtomicU64::new(0);
static RDB_DELETES: AtomicU64 = AtomicU64::new(0);
static RDB_PARTIAL_HEADERS: AtomicU64 = AtomicU64::new(0);
static RDB_GC_RUNS: AtomicU64 = AtomicU64::new(0);
static RDB_GC_BYTES_COPIED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    // Flash
    pub flash_reads: u64,
    pub flash_bytes_read: u64,
    pub flash_writes: u64,
    pub flash_bytes_written: u64,
    pub flash_erases: u64,

    // Filesystem
    pub fs_files_created: u64,
    pub fs_files_deleted: u64,
    pub fs_mount_repairs: u64,
    pub fs_orphans_swept: u64,
    pub fs_sectors_reclaimed: u64,

    // RDB
    pub rdb_inserts: u64,
    pub rdb_deletes: u64,
    pub rdb_partial_headers: u64,
    pub rdb_gc_runs: u64,
    pub rdb_gc_bytes_copied: u64,
}

impl MetricsSnapshot {
    /// Average bytes moved per GC run.
    pub fn avg_gc_bytes(&self) -> f64 {
        if self.rdb_gc_runs == 0 {
            0.0
        } else {
            self.rdb_gc_bytes_copied as f64 / self.rdb_gc_runs as f64
        }
    }
}

// ----- Recorders (Flash) -----
pub fn record_flash_read(len: usize) {
    FLASH_READS.fetch_add(1, Ordering::Relaxed);
    FLASH_BYTES_READ.fetch_add(len as u64, Ordering::Relaxed);
}

pub fn record_flash_write(len: usize) {
    FLASH_WRITES.fetch_add(1, Ordering::Relaxed);
    FLASH_BYTES_WRITTEN.fetch_add(len as u64, Ordering::Relaxed);
}

pub fn record_flash_erase() {
    FLASH_ERASES.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Filesystem) -----
pub fn record_file_created() {
    FS_FILES_CREATED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_file_deleted() {
    FS_FILES_DELETED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_mount_repair() {
    FS_MOUNT_REPAIRS.fetch_add(1, Ordering::Relaxed);
}
pub fn record_orphan_swept() {
    FS_ORPHANS_SWEPT.fetch_add(1, Ordering::Relaxed);
}
pub fn record_sector_reclaimed() {
    FS_SECTORS_RECLAIMED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (RDB) -----
pub fn record_rdb_insert() {
    RDB_INSERTS.fetch_add(1, Ordering::Relaxed);
}
pub fn record_rdb_delete() {
    RDB_DELETES.fetch_add(1, Ordering::Relaxed);
}
pub fn record_partial_header_skipped() {
    RDB_PARTIAL_HEADERS.fetch_add(1, Ordering::Relaxed);
}
pub fn record_gc_run(bytes_copied: usize) {
    RDB_GC_RUNS.fetch_add(1, Ordering::Relaxed);
    RDB_GC_BYTES_COPIED.fetch_add(bytes_copied as u64, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn metrics_snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        flash_reads: FLASH_READS.load(Ordering::Relaxed),
        flash_bytes_read: FLASH_BYTES_READ.load(Ordering::Relaxed),
        flash_writes: FLASH_WRITES.load(Ordering::Relaxed),
        flash_bytes_written: FLASH_BYTES_WRITTEN.load(Ordering::Relaxed),
        flash_erases: FLASH_ERASES.load(Ordering::Relaxed),

        fs_files_created: FS_FILES_CREATED.load(Ordering::Relaxed),
        fs_files_deleted: FS_FILES_DELETED.load(Ordering::Relaxed),
        fs_mount_repairs: FS_MOUNT_REPAIRS.load(Ordering::Relaxed),
        fs_orphans_swept: FS_ORPHANS_SWEPT.load(Ordering::Relaxed),
        fs_sectors_reclaimed: FS_SECTORS_RECLAIMED.load(Ordering::Relaxed),

        rdb_inserts: RDB_INSERTS.load(Ordering::Relaxed),
        rdb_deletes: RDB_DELETES.load(Ordering::Relaxed),
        rdb_partial_headers: RDB_PARTIAL_HEADERS.load(Ordering::Relaxed),
        rdb_gc_runs: RDB_GC_RUNS.load(Ordering::Relaxed),
        rdb_gc_bytes_copied: RDB_GC_BYTES_COPIED.load(Ordering::Relaxed),
    }
}

pub fn metrics_reset() {
    FLASH_READS.store(0, Ordering::Relaxed);
    FLASH_BYTES_READ.store(0, Ordering::Relaxed);
    FLASH_WRITES.store(0, Ordering::Relaxed);
    FLASH_BYTES_WRITTEN.store(0, Ordering::Relaxed);
    FLASH_ERASES.store(0, Ordering::Relaxed);

    FS_FILES_CREATED.store(0, Ordering::Relaxed);
    FS_FILES_DELETED.store(0, Ordering::Relaxed);
    FS_MOUNT_REPAIRS.store(0, Ordering::Relaxed);
    FS_ORPHANS_SWEPT.store(0, Ordering::Relaxed);
    FS_SECTORS_RECLAIMED.store(0, Ordering::Relaxed);

    RDB_INSERTS.store(0, Ordering::Relaxed);
    RDB_DELETES.store(0, Ordering::Relaxed);
    RDB_PARTIAL_HEADERS.store(0, Ordering::Relaxed);
    RDB_GC_RUNS.store(0, Ordering::Relaxed);
    RDB_GC_BYTES_COPIED.store(0, Ordering::Relaxed);
}
