//! fs/file: files and cursors.
//!
//! A `File` is the static extent of a file (or of a window into one, see
//! `subfile`); an `Fd` is a cheap `Copy` cursor over it. Cursors follow the
//! page chain lazily: the next page is looked up only when more bytes are
//! needed past the end of the current one.

use serde::Serialize;

use crate::consts::PAGE_HDR_SIZE;
use crate::error::{Result, StorageError};
use crate::page::PageState;

use super::core::{Fs, FsInner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct File {
    pub start_page: u16,
    /// Offset of byte 0 within `start_page`.
    pub start_pofs: usize,
    pub size: u32,
    /// False for a subfile view, which cannot be replaced or deleted.
    pub has_dirent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fd {
    pub(crate) file: File,
    /// File retired by `mark_written` (set by `create_replacing`).
    pub(crate) replaces: Option<File>,
    pub(crate) cur_page: u16,
    pub(crate) cur_pofs: usize,
    pub(crate) offset: usize,
}

impl Fd {
    /// Cursor at byte 0 of `file`.
    pub fn open(file: &File) -> Self {
        Self {
            file: *file,
            replaces: None,
            cur_page: file.start_page,
            cur_pofs: file.start_pofs,
            offset: 0,
        }
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.file.size as usize
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.size() - self.offset
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub file: File,
}

impl FsInner {
    pub(crate) fn find_file(&self, name: &str) -> Result<File> {
        if !self.valid {
            return Err(StorageError::NotFound(name.to_string()));
        }
        for pg in self.table.pages_in(PageState::FileStart, self.frontier) {
            let fh = self.read_file_header(pg)?;
            if !fh.is_live() || fh.tmp_file || !fh.create_complete {
                continue;
            }
            if fh.name_is(name) {
                return Ok(File {
                    start_page: pg,
                    start_pofs: fh.data_offset(),
                    size: fh.size,
                    has_dirent: true,
                });
            }
        }
        Err(StorageError::NotFound(name.to_string()))
    }

    pub(crate) fn list_files(&self) -> Result<Vec<DirEntry>> {
        self.ensure_valid()?;
        let mut out = Vec::new();
        for pg in self.table.pages_in(PageState::FileStart, self.frontier) {
            let fh = self.read_file_header(pg)?;
            if !fh.is_live() || fh.tmp_file || !fh.create_complete {
                continue;
            }
            out.push(DirEntry {
                name: fh.name_lossy(),
                file: File {
                    start_page: pg,
                    start_pofs: fh.data_offset(),
                    size: fh.size,
                    has_dirent: true,
                },
            });
        }
        Ok(out)
    }

    /// Move to the next page if the cursor sits at the end of the current one.
    fn step(&self, fd: &mut Fd) -> Result<()> {
        if fd.cur_pofs < self.cfg.page_size as usize {
            return Ok(());
        }
        let h = self.read_page_header(fd.cur_page)?;
        match h.next(fd.cur_page, self.page_count())? {
            Some(next) => {
                fd.cur_page = next;
                fd.cur_pofs = PAGE_HDR_SIZE;
                Ok(())
            }
            None => Err(StorageError::CorruptChain {
                page: fd.cur_page,
                next: h.next_page,
            }),
        }
    }

    pub(crate) fn read(&self, fd: &mut Fd, buf: &mut [u8]) -> Result<usize> {
        let ps = self.cfg.page_size as usize;
        let n = buf.len().min(fd.remaining());
        let mut done = 0;
        while done < n {
            self.step(fd)?;
            let chunk = (n - done).min(ps - fd.cur_pofs);
            self.read_at(fd.cur_page, fd.cur_pofs, &mut buf[done..done + chunk])?;
            fd.cur_pofs += chunk;
            fd.offset += chunk;
            done += chunk;
        }
        Ok(n)
    }

    pub(crate) fn write(&mut self, fd: &mut Fd, data: &[u8]) -> Result<usize> {
        self.ensure_valid()?;
        let ps = self.cfg.page_size as usize;
        let n = data.len().min(fd.remaining());
        let mut done = 0;
        while done < n {
            self.step(fd)?;
            let chunk = (n - done).min(ps - fd.cur_pofs);
            self.write_at(fd.cur_page, fd.cur_pofs, &data[done..done + chunk])?;
            fd.cur_pofs += chunk;
            fd.offset += chunk;
            done += chunk;
        }
        Ok(n)
    }

    pub(crate) fn seek(&self, fd: &mut Fd, ofs: i64, whence: Whence) -> Result<usize> {
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => fd.offset as i64,
            Whence::End => fd.size() as i64,
        };
        let target = base.saturating_add(ofs).clamp(0, fd.size() as i64) as usize;

        if target < fd.offset {
            let replaces = fd.replaces;
            *fd = Fd::open(&fd.file);
            fd.replaces = replaces;
        }

        let ps = self.cfg.page_size as usize;
        let mut left = target - fd.offset;
        while left > 0 {
            self.step(fd)?;
            let chunk = left.min(ps - fd.cur_pofs);
            fd.cur_pofs += chunk;
            fd.offset += chunk;
            left -= chunk;
        }
        Ok(fd.offset)
    }

    pub(crate) fn subfile(&self, file: &File, offset: usize, len: usize) -> Result<File> {
        let mut fd = Fd::open(file);
        let at = self.seek(&mut fd, offset as i64, Whence::Set)?;
        Ok(File {
            start_page: fd.cur_page,
            start_pofs: fd.cur_pofs,
            size: len.min(file.size as usize - at) as u32,
            has_dirent: false,
        })
    }
}

impl Fs {
    /// Look up a live, fully written file by name. An invalid filesystem has no files.
    pub fn find_file(&self, name: &str) -> Result<File> {
        self.lock().find_file(name)
    }

    pub fn list_files(&self) -> Result<Vec<DirEntry>> {
        self.lock().list_files()
    }

    pub fn open(&self, file: &File) -> Fd {
        Fd::open(file)
    }

    /// Read up to `buf.len()` bytes; short only at end of file.
    pub fn read(&self, fd: &mut Fd, buf: &mut [u8]) -> Result<usize> {
        self.lock().read(fd, buf)
    }

    /// Program up to `data.len()` bytes; writes never extend a file.
    pub fn write(&self, fd: &mut Fd, data: &[u8]) -> Result<usize> {
        self.lock().write(fd, data)
    }

    /// Returns the new absolute offset, clamped to `[0, size]`.
    pub fn seek(&self, fd: &mut Fd, ofs: i64, whence: Whence) -> Result<usize> {
        self.lock().seek(fd, ofs, whence)
    }

    pub fn size(&self, fd: &Fd) -> usize {
        fd.size()
    }

    /// A `len`-byte window of `file` starting at `offset`, readable through its own `Fd`.
    pub fn subfile(&self, file: &File, offset: usize, len: usize) -> Result<File> {
        self.lock().subfile(file, offset, len)
    }

    /// Whole contents of `file`.
    pub fn read_all(&self, file: &File) -> Result<Vec<u8>> {
        let mut fd = Fd::open(file);
        let mut out = vec![0u8; file.size as usize];
        let n = self.read(&mut fd, &mut out)?;
        out.truncate(n);
        Ok(out)
    }
}
