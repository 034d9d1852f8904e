//! fs/io: page-addressed device access. Every physical operation is counted
//! in `metrics`.

use crate::consts::{FILE_HDR_SIZE, MAX_FILENAME_LEN, PAGE_HDR_SIZE};
use crate::error::Result;
use crate::metrics::{record_flash_erase, record_flash_read, record_flash_write};
use crate::page::{FileHeader, PageHeader};

use super::core::FsInner;

impl FsInner {
    pub(crate) fn read_at(&self, pg: u16, ofs: usize, buf: &mut [u8]) -> Result<()> {
        record_flash_read(buf.len());
        self.dev.read(self.cfg.page_addr(pg, ofs), buf)
    }

    pub(crate) fn write_at(&mut self, pg: u16, ofs: usize, data: &[u8]) -> Result<()> {
        record_flash_write(data.len());
        let addr = self.cfg.page_addr(pg, ofs);
        self.dev.write(addr, data)
    }

    /// Erase `len` bytes starting at page `first`.
    pub(crate) fn erase_range(&mut self, first: u16, len: u32) -> Result<()> {
        record_flash_erase();
        let addr = self.cfg.page_addr(first, 0);
        self.dev.erase(addr, len)
    }

    pub(crate) fn read_raw_header(&self, pg: u16) -> Result<[u8; PAGE_HDR_SIZE]> {
        let mut raw = [0u8; PAGE_HDR_SIZE];
        self.read_at(pg, 0, &mut raw)?;
        Ok(raw)
    }

    pub(crate) fn read_page_header(&self, pg: u16) -> Result<PageHeader> {
        Ok(PageHeader::decode(&self.read_raw_header(pg)?))
    }

    pub(crate) fn write_page_header(&mut self, pg: u16, h: &PageHeader) -> Result<()> {
        self.write_at(pg, 0, &h.encode())
    }

    pub(crate) fn read_file_header(&self, pg: u16) -> Result<FileHeader> {
        let mut raw = [0u8; FILE_HDR_SIZE + MAX_FILENAME_LEN];
        self.read_at(pg, 0, &mut raw)?;
        Ok(FileHeader::decode(&raw))
    }

    /// Rewrite header and extension in place; the name is never rewritten.
    pub(crate) fn write_file_header(&mut self, pg: u16, fh: &FileHeader) -> Result<()> {
        self.write_at(pg, 0, &fh.encode())
    }
}
