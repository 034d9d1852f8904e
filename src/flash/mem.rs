//! flash/mem: in-memory NOR flash.
//!
//! Clones share the same backing array, so a test can keep one handle to
//! inject faults or inspect bytes while the filesystem owns another.
//! `fail_after(n)` lets `n` more program/erase operations through and then
//! rejects every following one, which models power being cut mid-sequence:
//! nothing after the cut reaches the array. `fail_once_after(n)` rejects only
//! the one operation after those `n`, like a transient program error.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{program, span, FlashDevice};
use crate::config::StorageConfig;
use crate::error::{Result, StorageError};

#[derive(Debug)]
struct MemState {
    base: u32,
    bytes: Vec<u8>,
    budget: Option<usize>,
    transient: bool,
    writes: u64,
    erases: u64,
}

#[derive(Clone, Debug)]
pub struct MemFlash {
    inner: Arc<Mutex<MemState>>,
}

impl MemFlash {
    /// Erased part of `len` bytes mapped at `base`.
    pub fn new(base: u32, len: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemState {
                base,
                bytes: vec![0xFF; len],
                budget: None,
                transient: false,
                writes: 0,
                erases: 0,
            })),
        }
    }

    /// Erased part covering exactly the filesystem region of `cfg`.
    pub fn for_config(cfg: &StorageConfig) -> Self {
        Self::new(cfg.region_start, cfg.region_len() as usize)
    }

    fn state(&self) -> MutexGuard<'_, MemState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Allow `ops` more program/erase operations, then fail all later ones.
    pub fn fail_after(&self, ops: usize) {
        let mut st = self.state();
        st.budget = Some(ops);
        st.transient = false;
    }

    /// Allow `ops` more program/erase operations, fail the next one, then
    /// work normally again.
    pub fn fail_once_after(&self, ops: usize) {
        let mut st = self.state();
        st.budget = Some(ops);
        st.transient = true;
    }

    /// Power restored: stop injecting failures.
    pub fn clear_fault(&self) {
        let mut st = self.state();
        st.budget = None;
        st.transient = false;
    }

    /// Program operations that reached the array so far.
    pub fn write_count(&self) -> u64 {
        self.state().writes
    }

    pub fn erase_count(&self) -> u64 {
        self.state().erases
    }

    /// Copy of the whole array.
    pub fn contents(&self) -> Vec<u8> {
        self.state().bytes.clone()
    }

    /// Overwrite bytes ignoring NOR rules (corruption injection).
    pub fn poke(&self, addr: u32, data: &[u8]) -> Result<()> {
        let mut st = self.state();
        let r = span("poke", st.base, st.bytes.len(), addr, data.len())?;
        st.bytes[r].copy_from_slice(data);
        Ok(())
    }

    fn take_budget(st: &mut MemState, op: &'static str, addr: u32, len: usize) -> Result<()> {
        match st.budget {
            Some(0) if st.transient => {
                st.budget = None;
                st.transient = false;
                Err(StorageError::device(op, addr, len, "injected program error"))
            }
            Some(0) => Err(StorageError::device(op, addr, len, "injected power loss")),
            Some(n) => {
                st.budget = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl FlashDevice for MemFlash {
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let st = self.state();
        let r = span("read", st.base, st.bytes.len(), addr, buf.len())?;
        buf.copy_from_slice(&st.bytes[r]);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let mut st = self.state();
        let r = span("write", st.base, st.bytes.len(), addr, data.len())?;
        Self::take_budget(&mut st, "write", addr, data.len())?;
        program(&mut st.bytes[r], data);
        st.writes += 1;
        Ok(())
    }

    fn erase(&mut self, addr: u32, len: u32) -> Result<()> {
        let mut st = self.state();
        let r = span("erase", st.base, st.bytes.len(), addr, len as usize)?;
        Self::take_budget(&mut st, "erase", addr, len as usize)?;
        st.bytes[r].fill(0xFF);
        st.erases += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_only_clears_bits() {
        let mut f = MemFlash::new(0x1000, 16);
        f.write(0x1000, &[0xF0, 0x0F]).unwrap();
        f.write(0x1000, &[0x3C, 0xFF]).unwrap();
        let mut b = [0u8; 2];
        f.read(0x1000, &mut b).unwrap();
        assert_eq!(b, [0x30, 0x0F]);

        f.erase(0x1000, 16).unwrap();
        f.read(0x1000, &mut b).unwrap();
        assert_eq!(b, [0xFF, 0xFF]);
    }

    #[test]
    fn out_of_range_is_an_error() {
        let mut f = MemFlash::new(0, 8);
        let mut b = [0u8; 4];
        assert!(f.read(6, &mut b).is_err());
        assert!(f.write(8, &[0]).is_err());
    }

    #[test]
    fn fault_injection_blocks_later_ops() {
        let mut f = MemFlash::new(0, 8);
        let handle = f.clone();
        handle.fail_after(1);
        f.write(0, &[0x00]).unwrap();
        assert!(f.write(1, &[0x00]).is_err());
        assert!(f.erase(0, 8).is_err());
        assert_eq!(handle.contents()[1], 0xFF);
        handle.clear_fault();
        f.write(1, &[0x00]).unwrap();
        assert_eq!(handle.write_count(), 2);
    }

    #[test]
    fn transient_fault_fails_one_op() {
        let mut f = MemFlash::new(0, 8);
        let handle = f.clone();
        handle.fail_once_after(1);
        f.write(0, &[0x00]).unwrap();
        assert!(f.write(1, &[0x00]).is_err());
        f.write(2, &[0x00]).unwrap();
        assert_eq!(handle.contents()[..3], [0x00, 0xFF, 0x00]);
        assert_eq!(handle.write_count(), 2);
    }
}
