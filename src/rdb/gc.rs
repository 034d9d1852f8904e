//! rdb/gc: compaction.
//!
//! Live records are copied verbatim, in scan order, into a replacement file
//! created with `create_replacing`; `mark_written` then retires the old file.
//! Until that point the old file is still the file of record, so a power cut
//! anywhere during GC loses nothing. If the copy fails while the filesystem
//! is still usable, the half-built replacement is deleted again.

use log::{info, warn};

use crate::config::DatabaseDef;
use crate::error::{Result, StorageError};
use crate::fs::{Fd, Fs, Whence};
use crate::metrics::record_gc_run;

use super::iter::{advance, iter_from, read_exact, write_all};
use super::registry::DbHandle;

const GC_CHUNK: usize = 64;

/// Compact the database open at `fd` so that `need` more bytes fit. Returns a
/// cursor on the new file positioned right after the copied records.
pub(crate) fn gc_for_bytes(fs: &Fs, def: &DatabaseDef, fd: &Fd, need: usize) -> Result<Fd> {
    let mut start = *fd;
    fs.seek(&mut start, 0, Whence::Set)?;

    let mut used = 0usize;
    let mut it = iter_from(fs, start)?;
    while it.valid {
        used += it.footprint();
        advance(fs, &mut it)?;
    }
    let size = fd.size();
    info!(
        "rdb: gc {}: {}/{} bytes live, {}/{} bytes used",
        def.filename,
        used,
        size,
        it.offset(),
        size
    );
    if need > size - used {
        warn!(
            "rdb: gc {}: {} free after compaction, {} needed",
            def.filename,
            size - used,
            need
        );
        return Err(StorageError::DatabaseFull {
            name: def.filename.clone(),
            needed: need,
            free: size - used,
        });
    }

    let old = *fd.file();
    let new_size = size.max(def.default_size as usize);
    let mut out = fs.create_replacing(&def.filename, new_size, &old)?;

    let copied = match copy_live(fs, start, &mut out) {
        Ok(n) => n,
        Err(e) => {
            // an invalid fs means the replacement is committed; mount retires the old file
            if fs.is_valid() {
                warn!("rdb: gc {}: copy failed ({}), dropping replacement", def.filename, e);
                if let Err(e2) = fs.delete(out.file()) {
                    warn!("rdb: gc {}: dropping replacement failed: {}", def.filename, e2);
                }
            }
            return Err(e);
        }
    };

    record_gc_run(copied);
    info!(
        "rdb: gc {}: copied {} bytes into {} byte file",
        def.filename, copied, new_size
    );
    Ok(out)
}

/// Copy every live record from `start` into `out`, then commit `out`.
fn copy_live(fs: &Fs, start: Fd, out: &mut Fd) -> Result<usize> {
    let mut buf = [0u8; GC_CHUNK];
    let mut copied = 0usize;
    let mut it = iter_from(fs, start)?;
    while it.valid {
        let mut from = it.fd;
        let mut left = it.footprint();
        while left > 0 {
            let n = left.min(GC_CHUNK);
            read_exact(fs, &mut from, &mut buf[..n])?;
            write_all(fs, out, &buf[..n])?;
            left -= n;
        }
        copied += it.footprint();
        advance(fs, &mut it)?;
    }
    fs.mark_written(out)?;
    Ok(copied)
}

impl DbHandle<'_> {
    /// Compact now, without waiting for an insert to run short. Returns the
    /// number of live bytes kept.
    pub fn compact(&self) -> Result<usize> {
        let file = self.fs.find_file(&self.def.filename)?;
        let out = gc_for_bytes(self.fs, self.def, &Fd::open(&file), 0)?;
        Ok(out.offset())
    }
}
