//! fs/doctor: read-only integrity audit of the mounted region.
//!
//! Checks every page the table holds as a file page: page header CRC,
//! next-page link (bounds and link CRC), and for start pages the file header
//! CRC. Pages whose magic is wrong are listed separately. Nothing is repaired.

use serde::Serialize;

use crate::error::Result;
use crate::page::{PageHeader, PageState};

use super::core::{Fs, FsInner};

#[derive(Debug, Clone, Default, Serialize)]
pub struct DoctorReport {
    pub pages_total: u16,
    pub pages_checked: usize,
    pub live_files: usize,
    pub bad_magic: Vec<u16>,
    pub page_crc_errors: Vec<u16>,
    pub link_errors: Vec<u16>,
    pub file_crc_errors: Vec<u16>,
}

impl DoctorReport {
    pub fn is_clean(&self) -> bool {
        self.bad_magic.is_empty()
            && self.page_crc_errors.is_empty()
            && self.link_errors.is_empty()
            && self.file_crc_errors.is_empty()
    }
}

impl FsInner {
    pub(crate) fn doctor(&self) -> Result<DoctorReport> {
        let n = self.page_count();
        let mut rep = DoctorReport {
            pages_total: n,
            ..Default::default()
        };

        for pg in 0..n {
            let h = PageHeader::decode(&self.read_raw_header(pg)?);
            if !h.magic_ok() {
                rep.bad_magic.push(pg);
                continue;
            }
            let state = self.table.get(pg);
            if !matches!(state, PageState::FileStart | PageState::FileCont) {
                continue;
            }
            rep.pages_checked += 1;
            if !h.crc_ok() {
                rep.page_crc_errors.push(pg);
            }
            if h.next(pg, n).is_err() {
                rep.link_errors.push(pg);
            }
            if state == PageState::FileStart {
                let fh = self.read_file_header(pg)?;
                if fh.is_live() && !fh.tmp_file {
                    rep.live_files += 1;
                }
                if !fh.crc_ok() {
                    rep.file_crc_errors.push(pg);
                }
            }
        }
        Ok(rep)
    }
}

impl Fs {
    pub fn doctor(&self) -> Result<DoctorReport> {
        self.lock().doctor()
    }
}
