//! page: on-flash page structures.
//!
//! Submodules:
//! - checksum.rs: page header CRC, next-page link CRC, file header CRC (crc32fast).
//! - header.rs: the 28-byte header at the start of every page.
//! - file_header.rs: the header extension and name on the first page of a file.
//! - table.rs: in-memory 2-bit-per-page classification built at mount.

pub mod checksum;
pub mod file_header;
pub mod header;
pub mod table;

// ---------------- re-exports ----------------

pub use checksum::{file_header_crc, link_crc, page_header_crc};
pub use file_header::FileHeader;
pub use header::PageHeader;
pub use table::{PageState, PageTable};
