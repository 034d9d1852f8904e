//! fs/alloc: page allocation and erase-sector reclaim.
//!
//! Allocation prefers the least-worn clean page, scanning round-robin from the
//! page after the last one handed out. Pages are only claimed in the table
//! here; the header write that makes the claim durable belongs to `create`.
//!
//! Reclaim picks an erase sector that holds no live file page and at least one
//! dirty page, lowest wear first, erases it and rewrites every header with its
//! wear counter bumped by one.

use log::{debug, info, warn};

use crate::error::{Result, StorageError};
use crate::metrics::record_sector_reclaimed;
use crate::page::{PageHeader, PageState};

use super::core::FsInner;

impl FsInner {
    /// Make sure at least `needed` clean pages exist, reclaiming sectors as needed.
    pub(crate) fn reserve(&mut self, needed: usize) -> Result<()> {
        loop {
            let clean = self.table.count(PageState::Clean);
            if clean >= needed {
                return Ok(());
            }
            if !self.reclaim_sector()? {
                return Err(StorageError::NoSpace {
                    needed,
                    available: clean,
                });
            }
        }
    }

    /// Claim one clean page as `state`; returns it with its current header.
    pub(crate) fn alloc_page(&mut self, state: PageState) -> Result<(u16, PageHeader)> {
        let n = self.page_count() as u32;
        let mut best: Option<(u16, PageHeader)> = None;

        for i in 0..n {
            let pg = ((self.last_alloc as u32 + 1 + i) % n) as u16;
            if self.table.get(pg) != PageState::Clean {
                continue;
            }
            let h = self.read_page_header(pg)?;
            if !h.magic_ok() || h.is_allocated() {
                warn!("fs: page {} was tracked clean but is not, parking it", pg);
                self.table.set(pg, PageState::Dirty);
                continue;
            }
            if h.wear_level <= self.best_wear {
                best = Some((pg, h));
                break;
            }
            if best.map_or(true, |(_, b)| h.wear_level < b.wear_level) {
                best = Some((pg, h));
            }
        }

        let (pg, h) = best.ok_or(StorageError::NoSpace {
            needed: 1,
            available: 0,
        })?;
        self.best_wear = h.wear_level;
        self.table.set(pg, state);
        self.last_alloc = pg;
        if pg >= self.frontier {
            self.frontier = pg + 1;
        }
        debug!("fs: allocated page {} (wear {}) as {:?}", pg, h.wear_level, state);
        Ok((pg, h))
    }

    /// Erase one reclaimable sector. Returns false if none qualifies.
    pub(crate) fn reclaim_sector(&mut self) -> Result<bool> {
        let n = self.page_count();
        let pps = self.cfg.pages_per_sector() as u16;

        let mut pick: Option<(u16, Vec<u32>, u32)> = None;
        for first in (0..n).step_by(pps as usize) {
            let pages = first..first + pps;
            let mut any_dirty = false;
            let mut in_use = false;
            for pg in pages.clone() {
                match self.table.get(pg) {
                    PageState::Dirty => any_dirty = true,
                    PageState::Clean => {}
                    PageState::FileStart | PageState::FileCont => in_use = true,
                }
            }
            if in_use || !any_dirty {
                continue;
            }

            let mut wears = Vec::with_capacity(pps as usize);
            for pg in pages {
                let h = self.read_page_header(pg)?;
                wears.push(if h.magic_ok() { h.wear_level } else { 0 });
            }
            let wear = wears.iter().copied().max().unwrap_or(0);
            if pick.as_ref().map_or(true, |(_, _, w)| wear < *w) {
                pick = Some((first, wears, wear));
            }
        }

        let Some((first, wears, wear)) = pick else {
            return Ok(false);
        };
        info!(
            "fs: reclaiming sector at page {} ({} pages, wear {})",
            first, pps, wear
        );
        self.erase_range(first, self.cfg.erase_size)?;
        for (i, w) in wears.iter().enumerate() {
            let pg = first + i as u16;
            let next_wear = w.saturating_add(1);
            self.write_page_header(pg, &PageHeader::fresh(next_wear))?;
            self.table.set(pg, PageState::Clean);
            if next_wear < self.best_wear {
                self.best_wear = next_wear;
            }
        }
        self.frontier = self.table.frontier();
        record_sector_reclaimed();
        Ok(true)
    }
}
