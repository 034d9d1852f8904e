//! page/checksum: integrity checks carried in page and file headers.
//!
//! - page header CRC: CRC32 over magic, wear counter, link CRC and next page.
//! - link CRC: low byte of CRC32 over the little-endian next-page index.
//! - file header CRC: CRC32 over size, flag2, name length, replaces and name.
//!
//! Status and allocation flags stay outside every CRC: they are
//! rewritten in place over the life of a page.

use crc32fast::Hasher;

pub fn page_header_crc(magic: u16, wear_level: u32, next_page_crc: u8, next_page: u16) -> u32 {
    let mut h = Hasher::new();
    h.update(&magic.to_le_bytes());
    h.update(&wear_level.to_le_bytes());
    h.update(&[next_page_crc]);
    h.update(&next_page.to_le_bytes());
    h.finalize()
}

#[inline]
pub fn link_crc(next_page: u16) -> u8 {
    (crc32fast::hash(&next_page.to_le_bytes()) & 0xFF) as u8
}

pub fn file_header_crc(size: u32, flag2: u8, name_len: u8, replaces: u16, name: &[u8]) -> u32 {
    let mut h = Hasher::new();
    h.update(&size.to_le_bytes());
    h.update(&[flag2, name_len]);
    h.update(&replaces.to_le_bytes());
    h.update(name);
    h.finalize()
}
