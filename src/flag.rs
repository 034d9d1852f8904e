//! Active-low flag bytes.
//!
//! NOR flash can only clear bits without an erase, so every on-flash flag is
//! stored inverted: bit = 0 means "set". `FlashFlags` hides the polarity; the
//! only mutation it offers is `set`, which is the 1 -> 0 transition a single
//! in-place write can perform. Going back requires erasing the page.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FlashFlags(u8);

impl FlashFlags {
    /// Freshly erased byte: no flag set.
    pub const ERASED: FlashFlags = FlashFlags(0xFF);

    #[inline]
    pub fn from_raw(raw: u8) -> Self {
        FlashFlags(raw)
    }

    #[inline]
    pub fn raw(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn is_set(self, bit: u8) -> bool {
        self.0 & bit == 0
    }

    /// Set `bit`. Irreversible until the containing page is erased.
    #[inline]
    pub fn set(&mut self, bit: u8) {
        self.0 &= !bit;
    }

    #[inline]
    pub fn with(mut self, bit: u8) -> Self {
        self.set(bit);
        self
    }

    #[inline]
    pub fn is_erased(self) -> bool {
        self.0 == 0xFF
    }
}

impl Default for FlashFlags {
    fn default() -> Self {
        FlashFlags::ERASED
    }
}

impl fmt::Debug for FlashFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlashFlags({:#04x})", self.0)
    }
}

/// 16-bit completion marker: zero means "done", anything else "pending".
#[inline]
pub fn marker_done(raw: u16) -> bool {
    raw == 0
}

#[inline]
pub fn marker_raw(done: bool) -> u16 {
    if done {
        0x0000
    } else {
        0xFFFF
    }
}
