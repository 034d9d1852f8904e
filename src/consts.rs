//! On-flash format constants (page header, file header extension, RDB records).
//!
//! All multi-byte fields are little-endian. Flag bytes are active-low: a cleared
//! bit means "true" (see `flag::FlashFlags`).

// -------- Page header (every page) --------
pub const PAGE_MAGIC: u16 = 0x5001;
pub const PAGE_HDR_SIZE: usize = 28; // [magic u16][alloc u8][status u8][rsvd u32][wear u32][rsvd 8][rsvd u8][next_crc u8][next u16][crc u32]

pub const OFF_MAGIC: usize = 0;
pub const OFF_ALLOC: usize = 2;
pub const OFF_STATUS: usize = 3;
pub const OFF_WEAR: usize = 8;
pub const OFF_NEXT_CRC: usize = 21;
pub const OFF_NEXT_PAGE: usize = 22;
pub const OFF_PAGE_CRC: usize = 24;

// alloc byte
pub const ALLOC_ALLOCATED: u8 = 0x1;
pub const ALLOC_MORE_BLOCKS: u8 = 0x2;

// status byte
pub const STATUS_VALID: u8 = 0x1;
pub const STATUS_DEAD: u8 = 0x2;
pub const STATUS_FILE_START: u8 = 0x4;
pub const STATUS_FILE_CONT: u8 = 0x8;

/// End-of-chain marker for `next_page`.
pub const NO_PAGE: u16 = 0xFFFF;

// -------- File header extension (first page of a file) --------
pub const FILE_HDR_SIZE: usize = 76; // page header + 48 bytes, name follows
pub const MAX_FILENAME_LEN: usize = 32;

pub const OFF_FILE_SIZE: usize = 28;
pub const OFF_FLAG2: usize = 32;
pub const OFF_NAME_LEN: usize = 33;
/// Start page of the file this one supersedes (NO_PAGE if none).
pub const OFF_REPLACES: usize = 34;
/// Zero once the superseded file is fully retired.
pub const OFF_REPLACE_DONE: usize = 36;
pub const OFF_FILE_CRC: usize = 40;
pub const OFF_TMP_FILE: usize = 44;
pub const OFF_CREATE_COMPLETE: usize = 46;
pub const OFF_DELETE_COMPLETE: usize = 48;

pub const FLAG2_HAS_FILENAME: u8 = 0x1;

/// Name of the legacy garbage-collection file; its presence makes the filesystem unusable.
pub const LEGACY_GC_FILE: &str = "GC";

// -------- RDB record header --------
pub const RDB_HDR_SIZE: usize = 4; // [flags u8][key_len u8][data_len u16]

pub const RDB_FLAG_WRITTEN: u8 = 0x1;
pub const RDB_FLAG_HEADER_WRITTEN: u8 = 0x2;
pub const RDB_FLAG_ERASED: u8 = 0x4;

/// key_len is a 7-bit field.
pub const RDB_MAX_KEY_LEN: usize = 0x7F;
/// data_len is an 11-bit field.
pub const RDB_MAX_DATA_LEN: usize = 0x7FF;
