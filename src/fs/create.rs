//! fs/create: file lifecycle: create, replace, commit, delete.
//!
//! A new file is written in three steps: the start page header with its name
//! (temporary, create pending), then each continuation header, then the
//! create-complete marker. It stays invisible to `find_file` until
//! `mark_written` clears the temporary marker; only then is a file it
//! replaces retired. Whatever step power is lost at, mount either drops the
//! new file or finishes retiring the old one.
//!
//! Deletes tombstone the start page first, then walk the chain, then set
//! delete-complete on the start page.

use log::{debug, error, warn};

use crate::consts::{FILE_HDR_SIZE, MAX_FILENAME_LEN, PAGE_HDR_SIZE};
use crate::error::{Result, StorageError};
use crate::metrics::{record_file_created, record_file_deleted};
use crate::page::{FileHeader, PageState};

use super::core::{Fs, FsInner};
use super::file::{Fd, File};

impl FsInner {
    /// Pages needed for `bytes` of data under a name of `name_len` bytes.
    pub(crate) fn pages_for(&self, name_len: usize, bytes: usize) -> usize {
        let payload = self.cfg.page_payload();
        (bytes + name_len + FILE_HDR_SIZE - PAGE_HDR_SIZE)
            .div_ceil(payload)
            .max(1)
    }

    pub(crate) fn create(&mut self, name: &str, bytes: usize, previous: Option<&File>) -> Result<Fd> {
        self.ensure_valid()?;
        if name.is_empty() || name.len() > MAX_FILENAME_LEN {
            return Err(StorageError::NameTooLong {
                len: name.len(),
                max: MAX_FILENAME_LEN,
            });
        }
        if bytes > u32::MAX as usize {
            return Err(StorageError::InvalidData(format!("file size {} too large", bytes)));
        }
        match previous {
            Some(prev) if !prev.has_dirent => {
                return Err(StorageError::InvalidData(
                    "cannot replace a subfile".into(),
                ))
            }
            Some(_) => {}
            None => match self.find_file(name) {
                Ok(_) => return Err(StorageError::FileExists(name.to_string())),
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e),
            },
        }

        let npages = self.pages_for(name.len(), bytes);
        self.reserve(npages)?;

        let mut claimed = Vec::with_capacity(npages);
        let (start, fh) = match self.write_chain(name, bytes, npages, previous, &mut claimed) {
            Ok(done) => done,
            Err(e) => {
                if let Err(e2) = self.abandon_chain(&claimed) {
                    error!(
                        "fs: releasing pages of failed create '{}' failed ({}); remount required",
                        name, e2
                    );
                    self.valid = false;
                }
                return Err(e);
            }
        };
        record_file_created();
        debug!(
            "fs: created '{}' at page {} ({} bytes, {} pages{})",
            name,
            start,
            bytes,
            npages,
            if previous.is_some() { ", replacing" } else { "" }
        );

        let file = File {
            start_page: start,
            start_pofs: fh.data_offset(),
            size: bytes as u32,
            has_dirent: true,
        };
        let mut fd = Fd::open(&file);
        fd.replaces = previous.copied();
        Ok(fd)
    }

    /// Claim and write the start page, continuation headers and the
    /// create-complete marker. Every page claimed is pushed to `claimed`.
    fn write_chain(
        &mut self,
        name: &str,
        bytes: usize,
        npages: usize,
        previous: Option<&File>,
        claimed: &mut Vec<u16>,
    ) -> Result<(u16, FileHeader)> {
        let (start, start_hdr) = self.alloc_page(PageState::FileStart)?;
        claimed.push(start);
        let mut next = if npages > 1 {
            let (pg, h) = self.alloc_page(PageState::FileCont)?;
            claimed.push(pg);
            Some((pg, h))
        } else {
            None
        };

        let mut page = start_hdr;
        page.claim(true);
        page.link(next.map(|(pg, _)| pg));
        let mut fh = FileHeader::new(
            page,
            bytes as u32,
            name.as_bytes(),
            previous.map(|p| p.start_page),
        );
        self.write_at(start, 0, &fh.encode_with_name())?;

        for i in 1..npages {
            let Some((pg, mut h)) = next else { break };
            next = if i + 1 < npages {
                let (p, nh) = self.alloc_page(PageState::FileCont)?;
                claimed.push(p);
                Some((p, nh))
            } else {
                None
            };
            h.claim(false);
            h.link(next.map(|(p, _)| p));
            self.write_page_header(pg, &h)?;
        }

        fh.create_complete = true;
        self.write_file_header(start, &fh)?;
        Ok((start, fh))
    }

    /// Give back the pages of a create that failed part way. Pages whose
    /// header was never written go back to clean; written ones are tombstoned.
    fn abandon_chain(&mut self, claimed: &[u16]) -> Result<()> {
        let Some(&start) = claimed.first() else {
            return Ok(());
        };
        if self.read_page_header(start)?.is_allocated() {
            self.delete_chain(start)?;
        }
        let mut released = 0;
        for &pg in claimed {
            let mut h = self.read_page_header(pg)?;
            if h.magic_ok() && !h.is_allocated() {
                self.table.set(pg, PageState::Clean);
                released += 1;
                continue;
            }
            if h.magic_ok() && !h.is_dead() {
                h.mark_dead();
                self.write_page_header(pg, &h)?;
            }
            self.table.set(pg, PageState::Dirty);
        }
        warn!(
            "fs: abandoned create at page {}: {} of {} pages released",
            start,
            released,
            claimed.len()
        );
        Ok(())
    }

    pub(crate) fn mark_written(&mut self, fd: &mut Fd) -> Result<()> {
        self.ensure_valid()?;
        let start = fd.file.start_page;
        let mut fh = self.read_file_header(start)?;
        if fh.tmp_file {
            fh.tmp_file = false;
            self.write_file_header(start, &fh)?;
        }

        if let Some(old) = fd.replaces.take() {
            let res = self.delete_chain(old.start_page).and_then(|_| {
                let mut fh = self.read_file_header(start)?;
                fh.replace_complete = true;
                self.write_file_header(start, &fh)
            });
            if let Err(e) = res {
                error!("fs: retiring page {} failed ({}); remount required", old.start_page, e);
                self.valid = false;
                return Err(e);
            }
        }
        debug!("fs: '{}' written", fh.name_lossy());
        Ok(())
    }

    pub(crate) fn delete(&mut self, file: &File) -> Result<()> {
        self.ensure_valid()?;
        if !file.has_dirent {
            return Err(StorageError::InvalidData("cannot delete a subfile".into()));
        }
        let fh = self.read_file_header(file.start_page)?;
        if !fh.is_live() {
            return Err(StorageError::NotFound(format!("page {}", file.start_page)));
        }
        if let Err(e) = self.delete_chain(file.start_page) {
            error!("fs: deleting '{}' failed ({}); remount required", fh.name_lossy(), e);
            self.valid = false;
            return Err(e);
        }
        Ok(())
    }

    /// Tombstone every page of the chain starting at `start`, then set
    /// delete-complete. Stops at pages that were claimed but never written.
    pub(crate) fn delete_chain(&mut self, start: u16) -> Result<()> {
        let n = self.page_count();
        let mut cur = start;
        for _ in 0..n {
            let mut h = self.read_page_header(cur)?;
            if !h.magic_ok() || !h.is_allocated() {
                break;
            }
            if !h.is_dead() {
                h.mark_dead();
                self.write_page_header(cur, &h)?;
            }
            self.table.set(cur, PageState::Dirty);
            match h.next(cur, n) {
                Ok(Some(next)) if next != start => cur = next,
                Ok(_) => break,
                Err(e) => {
                    warn!("fs: {} while deleting chain at {}", e, start);
                    break;
                }
            }
        }

        let mut fh = self.read_file_header(start)?;
        fh.delete_complete = true;
        self.write_file_header(start, &fh)?;
        record_file_deleted();
        debug!("fs: deleted '{}' (page {})", fh.name_lossy(), start);
        Ok(())
    }
}

impl Fs {
    /// Create a temporary file of `bytes` bytes. It becomes visible after `mark_written`.
    pub fn create(&self, name: &str, bytes: usize) -> Result<Fd> {
        self.lock().create(name, bytes, None)
    }

    /// Create a file that atomically supersedes `previous` once marked written.
    pub fn create_replacing(&self, name: &str, bytes: usize, previous: &File) -> Result<Fd> {
        self.lock().create(name, bytes, Some(previous))
    }

    pub fn mark_written(&self, fd: &mut Fd) -> Result<()> {
        self.lock().mark_written(fd)
    }

    pub fn delete(&self, file: &File) -> Result<()> {
        self.lock().delete(file)
    }
}
