//! fs/mount: classification and repair at mount.
//!
//! Passes, in order:
//! 1. classify every page into the table; blank pages (an erase cut short) get
//!    a fresh header; pages with a foreign magic are parked as Dirty.
//! 2. finish interrupted creates, deletes and abandoned temp files; refuse the
//!    legacy GC file.
//! 3. finish replacements whose superseded file is still alive.
//! 4. tombstone continuation pages no live file reaches.

use log::{error, info, warn};

use crate::consts::LEGACY_GC_FILE;
use crate::error::Result;
use crate::metrics::{record_mount_repair, record_orphan_swept};
use crate::page::{PageHeader, PageState};

use super::core::FsInner;

impl FsInner {
    pub(crate) fn mount(&mut self) -> Result<()> {
        let n = self.page_count();
        self.valid = false;
        self.table = crate::page::PageTable::new(n);
        self.frontier = 0;
        self.best_wear = u32::MAX;
        self.last_alloc = n - 1;

        let raw0 = self.read_raw_header(0)?;
        let h0 = PageHeader::decode(&raw0);
        if !h0.magic_ok() && !(PageHeader::is_blank(&raw0) && self.any_formatted()?) {
            error!(
                "fs: page 0 has bad magic {:#06x}; region is not formatted",
                h0.magic
            );
            return Ok(());
        }

        self.classify()?;
        self.frontier = self.table.frontier();

        if !self.cleanup_files()? {
            return Ok(());
        }
        self.finish_replacements()?;
        self.sweep_orphans()?;
        self.frontier = self.table.frontier();

        self.valid = true;
        let st = self.stats();
        info!(
            "fs: mounted {} pages: {} clean, {} files, {} continuation, {} dirty (frontier {})",
            st.pages, st.clean, st.file_start, st.file_cont, st.dirty, st.frontier
        );
        Ok(())
    }

    /// A blank page 0 next to formatted pages is a sector erase cut short.
    fn any_formatted(&self) -> Result<bool> {
        for pg in 1..self.page_count() {
            if self.read_page_header(pg)?.magic_ok() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn note_wear(&mut self, wear: u32) {
        if wear < self.best_wear {
            self.best_wear = wear;
        }
    }

    fn classify(&mut self) -> Result<()> {
        for pg in 0..self.page_count() {
            let raw = self.read_raw_header(pg)?;
            let state = if PageHeader::is_blank(&raw) {
                warn!("fs: page {} has no header, rewriting", pg);
                self.write_page_header(pg, &PageHeader::fresh(1))?;
                record_mount_repair();
                self.note_wear(1);
                PageState::Clean
            } else {
                let h = PageHeader::decode(&raw);
                if !h.magic_ok() {
                    warn!("fs: page {} has bad magic {:#06x}", pg, h.magic);
                    PageState::Dirty
                } else if !h.is_allocated() {
                    self.note_wear(h.wear_level);
                    PageState::Clean
                } else if h.is_dead() {
                    PageState::Dirty
                } else if h.is_file_start() || h.is_file_cont() {
                    if !h.crc_ok() {
                        warn!("fs: page {} header CRC mismatch", pg);
                    }
                    if h.is_file_start() {
                        PageState::FileStart
                    } else {
                        PageState::FileCont
                    }
                } else {
                    warn!("fs: page {} allocated without a role", pg);
                    PageState::Dirty
                }
            };
            self.table.set(pg, state);
        }
        Ok(())
    }

    /// Returns false if the filesystem must stay invalid.
    fn cleanup_files(&mut self) -> Result<bool> {
        for pg in 0..self.frontier {
            if !matches!(
                self.table.get(pg),
                PageState::FileStart | PageState::Dirty
            ) {
                continue;
            }
            let fh = self.read_file_header(pg)?;
            let p = &fh.page;
            if !p.magic_ok() || !p.is_allocated() || !p.is_file_start() {
                continue;
            }
            let name = fh.name_lossy();

            if p.is_dead() {
                if !fh.delete_complete {
                    warn!("fs: finishing interrupted delete of '{}' (page {})", name, pg);
                    self.delete_chain(pg)?;
                    record_mount_repair();
                }
                continue;
            }
            if !fh.create_complete {
                warn!("fs: removing incompletely created '{}' (page {})", name, pg);
                self.delete_chain(pg)?;
                record_mount_repair();
                continue;
            }
            if fh.tmp_file {
                warn!("fs: removing abandoned temp file '{}' (page {})", name, pg);
                self.delete_chain(pg)?;
                record_mount_repair();
                continue;
            }
            if fh.name_is(LEGACY_GC_FILE) {
                error!(
                    "fs: legacy GC file at page {}; filesystem cannot be used without format",
                    pg
                );
                return Ok(false);
            }
            if !fh.crc_ok() {
                warn!("fs: file header CRC mismatch on '{}' (page {})", name, pg);
            }
        }
        Ok(true)
    }

    fn finish_replacements(&mut self) -> Result<()> {
        for pg in self.table.pages_in(PageState::FileStart, self.frontier) {
            let mut fh = self.read_file_header(pg)?;
            if !fh.is_live() || !fh.replace_pending() {
                continue;
            }
            let Some(old) = fh.replaces else { continue };
            if old < self.page_count()
                && old != pg
                && self.table.get(old) == PageState::FileStart
            {
                let ofh = self.read_file_header(old)?;
                if ofh.is_live() && ofh.name == fh.name {
                    warn!(
                        "fs: finishing replacement of '{}' (page {} -> {})",
                        fh.name_lossy(),
                        old,
                        pg
                    );
                    self.delete_chain(old)?;
                    record_mount_repair();
                }
            }
            fh.replace_complete = true;
            self.write_file_header(pg, &fh)?;
        }
        Ok(())
    }

    fn sweep_orphans(&mut self) -> Result<()> {
        let n = self.page_count();
        let mut reachable = vec![false; n as usize];

        for start in self.table.pages_in(PageState::FileStart, self.frontier) {
            let mut cur = start;
            loop {
                reachable[cur as usize] = true;
                let h = self.read_page_header(cur)?;
                match h.next(cur, n) {
                    Ok(Some(next)) => {
                        if reachable[next as usize]
                            || self.table.get(next) != PageState::FileCont
                        {
                            break;
                        }
                        cur = next;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("fs: {}", e);
                        break;
                    }
                }
            }
        }

        for pg in 0..n {
            if self.table.get(pg) != PageState::FileCont || reachable[pg as usize] {
                continue;
            }
            warn!("fs: page {} is an orphaned continuation, tombstoning", pg);
            let mut h = self.read_page_header(pg)?;
            h.mark_dead();
            self.write_page_header(pg, &h)?;
            self.table.set(pg, PageState::Dirty);
            record_orphan_swept();
        }
        Ok(())
    }
}
