//! page/table: 2-bit-per-page classification built at mount.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageState {
    /// Has a header, not allocated: ready for a file.
    Clean = 0,
    FileStart = 1,
    FileCont = 2,
    /// Dead, corrupt or otherwise unusable until its sector is erased.
    Dirty = 3,
}

impl PageState {
    fn from_bits(b: u8) -> Self {
        match b & 0b11 {
            0 => PageState::Clean,
            1 => PageState::FileStart,
            2 => PageState::FileCont,
            _ => PageState::Dirty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageTable {
    bits: Vec<u8>,
    pages: u16,
}

impl PageTable {
    /// All pages Clean.
    pub fn new(pages: u16) -> Self {
        Self {
            bits: vec![0u8; (pages as usize).div_ceil(4)],
            pages,
        }
    }

    #[inline]
    pub fn pages(&self) -> u16 {
        self.pages
    }

    #[inline]
    pub fn get(&self, pg: u16) -> PageState {
        let i = pg as usize;
        PageState::from_bits(self.bits[i / 4] >> ((i % 4) * 2))
    }

    #[inline]
    pub fn set(&mut self, pg: u16, st: PageState) {
        let i = pg as usize;
        let shift = (i % 4) * 2;
        let b = &mut self.bits[i / 4];
        *b = (*b & !(0b11 << shift)) | ((st as u8) << shift);
    }

    pub fn count(&self, st: PageState) -> usize {
        (0..self.pages).filter(|&p| self.get(p) == st).count()
    }

    /// Pages in state `st` below `limit`, ascending.
    pub fn pages_in(&self, st: PageState, limit: u16) -> Vec<u16> {
        (0..limit.min(self.pages))
            .filter(|&p| self.get(p) == st)
            .collect()
    }

    /// One past the highest non-clean page.
    pub fn frontier(&self) -> u16 {
        (0..self.pages)
            .rev()
            .find(|&p| self.get(p) != PageState::Clean)
            .map_or(0, |p| p + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_bits_per_page() {
        let mut t = PageTable::new(10);
        assert_eq!(t.frontier(), 0);
        t.set(0, PageState::FileStart);
        t.set(1, PageState::FileCont);
        t.set(2, PageState::Dirty);
        t.set(5, PageState::FileStart);
        assert_eq!(t.get(0), PageState::FileStart);
        assert_eq!(t.get(1), PageState::FileCont);
        assert_eq!(t.get(2), PageState::Dirty);
        assert_eq!(t.get(3), PageState::Clean);
        assert_eq!(t.frontier(), 6);
        t.set(5, PageState::Clean);
        assert_eq!(t.frontier(), 3);
        assert_eq!(t.count(PageState::Clean), 7);
        assert_eq!(t.pages_in(PageState::FileStart, 10), vec![0]);
    }
}
