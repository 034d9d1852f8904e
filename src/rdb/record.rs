//! rdb/record: `[flags u8][key_len u8][data_len u16 LE]`, then key, then value.

use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{RDB_FLAG_ERASED, RDB_FLAG_HEADER_WRITTEN, RDB_FLAG_WRITTEN, RDB_HDR_SIZE};
use crate::flag::FlashFlags;

/// Where a record slot is in its lifecycle, as read back from flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Never written: the insertion point.
    Empty,
    /// Lengths written, header not confirmed. Only the header is trusted to be dirty.
    HeaderWriting,
    /// Header confirmed, data not: the slot spans `key_len + data_len` bytes of junk.
    HeaderWritten,
    Written,
    Erased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub flags: FlashFlags,
    pub key_len: u8,
    pub data_len: u16,
}

impl RecordHeader {
    /// Phase-one header: lengths only, no flag set.
    pub fn pending(key_len: usize, data_len: usize) -> Self {
        Self {
            flags: FlashFlags::ERASED,
            key_len: key_len as u8,
            data_len: data_len as u16,
        }
    }

    pub fn decode(raw: &[u8; RDB_HDR_SIZE]) -> Self {
        Self {
            flags: FlashFlags::from_raw(raw[0]),
            key_len: raw[1],
            data_len: LittleEndian::read_u16(&raw[2..4]),
        }
    }

    pub fn encode(&self) -> [u8; RDB_HDR_SIZE] {
        let mut raw = [0u8; RDB_HDR_SIZE];
        raw[0] = self.flags.raw();
        raw[1] = self.key_len;
        LittleEndian::write_u16(&mut raw[2..4], self.data_len);
        raw
    }

    pub fn state(&self) -> RecordState {
        if self.flags.is_erased() && self.key_len == 0xFF && self.data_len == 0xFFFF {
            RecordState::Empty
        } else if !self.flags.is_set(RDB_FLAG_HEADER_WRITTEN) && !self.flags.is_set(RDB_FLAG_WRITTEN) {
            RecordState::HeaderWriting
        } else if self.flags.is_set(RDB_FLAG_ERASED) {
            RecordState::Erased
        } else if !self.flags.is_set(RDB_FLAG_WRITTEN) {
            RecordState::HeaderWritten
        } else {
            RecordState::Written
        }
    }

    /// Key plus value bytes following the header.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.key_len as usize + self.data_len as usize
    }
}
