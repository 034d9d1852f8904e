//! flash: the raw device seam under the filesystem.
//!
//! - mem.rs: in-memory NOR simulator with power-loss injection (tests, tools)
//! - image.rs: memory-mapped flash image file (host inspection of dumps)
//!
//! NOR semantics every implementation must honor: `write` can only clear bits
//! (the stored byte becomes `old & new`), `erase` sets a range back to 0xFF.

pub mod image;
pub mod mem;

pub use image::ImageFlash;
pub use mem::MemFlash;

use crate::error::Result;

/// Byte-addressable flash part. Addresses are absolute device addresses.
pub trait FlashDevice: Send {
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()>;

    /// Program `data` at `addr`. Bits already 0 stay 0.
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()>;

    /// Erase `[addr, addr + len)` back to 0xFF.
    fn erase(&mut self, addr: u32, len: u32) -> Result<()>;

    /// Flush buffered state to the backing store, if any.
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Map `[addr, addr+len)` into an index range of a backing buffer starting at `base`.
pub(crate) fn span(
    op: &'static str,
    base: u32,
    total: usize,
    addr: u32,
    len: usize,
) -> Result<std::ops::Range<usize>> {
    let start = (addr as u64).checked_sub(base as u64);
    match start {
        Some(s) if s as usize + len <= total => Ok(s as usize..s as usize + len),
        _ => Err(crate::error::StorageError::device(
            op,
            addr,
            len,
            "address out of range",
        )),
    }
}

/// NOR program: AND `data` into `dst`.
#[inline]
pub(crate) fn program(dst: &mut [u8], data: &[u8]) {
    for (d, s) in dst.iter_mut().zip(data) {
        *d &= *s;
    }
}
