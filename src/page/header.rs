//! page/header: the header at offset 0 of every page.

use byteorder::{ByteOrder, LittleEndian};

use super::checksum::{link_crc, page_header_crc};
use crate::consts::{
    ALLOC_ALLOCATED, ALLOC_MORE_BLOCKS, NO_PAGE, OFF_ALLOC, OFF_MAGIC, OFF_NEXT_CRC,
    OFF_NEXT_PAGE, OFF_PAGE_CRC, OFF_STATUS, OFF_WEAR, PAGE_HDR_SIZE, PAGE_MAGIC, STATUS_DEAD,
    STATUS_FILE_CONT, STATUS_FILE_START, STATUS_VALID,
};
use crate::error::{Result, StorageError};
use crate::flag::FlashFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub magic: u16,
    pub alloc: FlashFlags,
    pub status: FlashFlags,
    pub wear_level: u32,
    pub next_page_crc: u8,
    pub next_page: u16,
    pub crc: u32,
}

impl PageHeader {
    /// Header of a clean page as written by format and sector reclaim.
    pub fn fresh(wear_level: u32) -> Self {
        Self {
            magic: PAGE_MAGIC,
            alloc: FlashFlags::ERASED,
            status: FlashFlags::ERASED,
            wear_level,
            next_page_crc: 0xFF,
            next_page: NO_PAGE,
            crc: 0xFFFF_FFFF,
        }
    }

    pub fn decode(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= PAGE_HDR_SIZE);
        Self {
            magic: LittleEndian::read_u16(&buf[OFF_MAGIC..OFF_MAGIC + 2]),
            alloc: FlashFlags::from_raw(buf[OFF_ALLOC]),
            status: FlashFlags::from_raw(buf[OFF_STATUS]),
            wear_level: LittleEndian::read_u32(&buf[OFF_WEAR..OFF_WEAR + 4]),
            next_page_crc: buf[OFF_NEXT_CRC],
            next_page: LittleEndian::read_u16(&buf[OFF_NEXT_PAGE..OFF_NEXT_PAGE + 2]),
            crc: LittleEndian::read_u32(&buf[OFF_PAGE_CRC..OFF_PAGE_CRC + 4]),
        }
    }

    /// Encode into `buf[..PAGE_HDR_SIZE]`. Reserved bytes are left at 0xFF so a
    /// rewrite never disturbs them.
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= PAGE_HDR_SIZE);
        buf[..PAGE_HDR_SIZE].fill(0xFF);
        LittleEndian::write_u16(&mut buf[OFF_MAGIC..OFF_MAGIC + 2], self.magic);
        buf[OFF_ALLOC] = self.alloc.raw();
        buf[OFF_STATUS] = self.status.raw();
        LittleEndian::write_u32(&mut buf[OFF_WEAR..OFF_WEAR + 4], self.wear_level);
        buf[OFF_NEXT_CRC] = self.next_page_crc;
        LittleEndian::write_u16(&mut buf[OFF_NEXT_PAGE..OFF_NEXT_PAGE + 2], self.next_page);
        LittleEndian::write_u32(&mut buf[OFF_PAGE_CRC..OFF_PAGE_CRC + 4], self.crc);
    }

    pub fn encode(&self) -> [u8; PAGE_HDR_SIZE] {
        let mut buf = [0u8; PAGE_HDR_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// True if every header byte still reads as erased.
    pub fn is_blank(raw: &[u8]) -> bool {
        raw[..PAGE_HDR_SIZE].iter().all(|&b| b == 0xFF)
    }

    #[inline]
    pub fn magic_ok(&self) -> bool {
        self.magic == PAGE_MAGIC
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.alloc.is_set(ALLOC_ALLOCATED)
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.status.is_set(STATUS_DEAD)
    }

    #[inline]
    pub fn is_file_start(&self) -> bool {
        self.status.is_set(STATUS_FILE_START)
    }

    #[inline]
    pub fn is_file_cont(&self) -> bool {
        self.status.is_set(STATUS_FILE_CONT)
    }

    /// Claim the page for a file: allocated, valid, and either a start or a
    /// continuation page.
    pub fn claim(&mut self, file_start: bool) {
        self.alloc.set(ALLOC_ALLOCATED);
        self.status.set(STATUS_VALID);
        self.status.set(if file_start {
            STATUS_FILE_START
        } else {
            STATUS_FILE_CONT
        });
    }

    /// Point this page at its successor (or end the chain) and seal the header CRC.
    pub fn link(&mut self, next: Option<u16>) {
        let next = next.unwrap_or(NO_PAGE);
        if next != NO_PAGE {
            self.alloc.set(ALLOC_MORE_BLOCKS);
        }
        self.next_page = next;
        self.next_page_crc = link_crc(next);
        self.crc = self.expected_crc();
    }

    #[inline]
    pub fn mark_dead(&mut self) {
        self.status.set(STATUS_DEAD);
    }

    pub fn expected_crc(&self) -> u32 {
        page_header_crc(self.magic, self.wear_level, self.next_page_crc, self.next_page)
    }

    /// A header never linked keeps its erased CRC; that is not an error.
    pub fn crc_ok(&self) -> bool {
        self.crc == 0xFFFF_FFFF || self.crc == self.expected_crc()
    }

    /// Successor of page `page`, bounds- and link-checked.
    pub fn next(&self, page: u16, page_count: u16) -> Result<Option<u16>> {
        if self.next_page == NO_PAGE {
            return Ok(None);
        }
        if self.next_page >= page_count
            || self.next_page == page
            || self.next_page_crc != link_crc(self.next_page)
        {
            return Err(StorageError::CorruptChain {
                page,
                next: self.next_page,
            });
        }
        Ok(Some(self.next_page))
    }
}
