//! page/file_header: file metadata on the first page of a file.
//!
//! Bytes [0, 28) are the ordinary page header; [28, 76) the extension below;
//! the name (no terminator, `name_len` bytes) follows at 76.

use byteorder::{ByteOrder, LittleEndian};

use super::checksum::file_header_crc;
use super::header::PageHeader;
use crate::consts::{
    FILE_HDR_SIZE, FLAG2_HAS_FILENAME, MAX_FILENAME_LEN, NO_PAGE, OFF_CREATE_COMPLETE,
    OFF_DELETE_COMPLETE, OFF_FILE_CRC, OFF_FILE_SIZE, OFF_FLAG2, OFF_NAME_LEN, OFF_REPLACES,
    OFF_REPLACE_DONE, OFF_TMP_FILE, PAGE_HDR_SIZE,
};
use crate::flag::{marker_done, marker_raw, FlashFlags};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub page: PageHeader,
    pub size: u32,
    pub flag2: FlashFlags,
    pub name_len: u8,
    /// Start page of the file this one supersedes, if any.
    pub replaces: Option<u16>,
    pub replace_complete: bool,
    pub crc: u32,
    pub tmp_file: bool,
    pub create_complete: bool,
    pub delete_complete: bool,
    pub name: Vec<u8>,
}

impl FileHeader {
    /// Header for a file being created on top of the page header `page`.
    /// Starts out temporary and with create pending.
    pub fn new(page: PageHeader, size: u32, name: &[u8], replaces: Option<u16>) -> Self {
        let mut fh = Self {
            page,
            size,
            flag2: FlashFlags::ERASED.with(FLAG2_HAS_FILENAME),
            name_len: name.len() as u8,
            replaces,
            replace_complete: false,
            crc: 0,
            tmp_file: true,
            create_complete: false,
            delete_complete: false,
            name: name.to_vec(),
        };
        fh.crc = fh.expected_crc();
        fh
    }

    /// Decode from a buffer holding at least `FILE_HDR_SIZE` bytes; the name is
    /// taken from whatever follows, truncated to `MAX_FILENAME_LEN`.
    pub fn decode(buf: &[u8]) -> Self {
        debug_assert!(buf.len() >= FILE_HDR_SIZE);
        let name_len = buf[OFF_NAME_LEN];
        let take = (name_len as usize)
            .min(MAX_FILENAME_LEN)
            .min(buf.len() - FILE_HDR_SIZE);
        let replaces = LittleEndian::read_u16(&buf[OFF_REPLACES..OFF_REPLACES + 2]);
        Self {
            page: PageHeader::decode(&buf[..PAGE_HDR_SIZE]),
            size: LittleEndian::read_u32(&buf[OFF_FILE_SIZE..OFF_FILE_SIZE + 4]),
            flag2: FlashFlags::from_raw(buf[OFF_FLAG2]),
            name_len,
            replaces: (replaces != NO_PAGE).then_some(replaces),
            replace_complete: marker_done(LittleEndian::read_u16(
                &buf[OFF_REPLACE_DONE..OFF_REPLACE_DONE + 2],
            )),
            crc: LittleEndian::read_u32(&buf[OFF_FILE_CRC..OFF_FILE_CRC + 4]),
            tmp_file: !marker_done(LittleEndian::read_u16(&buf[OFF_TMP_FILE..OFF_TMP_FILE + 2])),
            create_complete: marker_done(LittleEndian::read_u16(
                &buf[OFF_CREATE_COMPLETE..OFF_CREATE_COMPLETE + 2],
            )),
            delete_complete: marker_done(LittleEndian::read_u16(
                &buf[OFF_DELETE_COMPLETE..OFF_DELETE_COMPLETE + 2],
            )),
            name: buf[FILE_HDR_SIZE..FILE_HDR_SIZE + take].to_vec(),
        }
    }

    /// Page header plus extension, without the name.
    pub fn encode(&self) -> [u8; FILE_HDR_SIZE] {
        let mut buf = [0xFFu8; FILE_HDR_SIZE];
        self.page.encode_into(&mut buf[..PAGE_HDR_SIZE]);
        LittleEndian::write_u32(&mut buf[OFF_FILE_SIZE..OFF_FILE_SIZE + 4], self.size);
        buf[OFF_FLAG2] = self.flag2.raw();
        buf[OFF_NAME_LEN] = self.name_len;
        LittleEndian::write_u16(
            &mut buf[OFF_REPLACES..OFF_REPLACES + 2],
            self.replaces.unwrap_or(NO_PAGE),
        );
        LittleEndian::write_u16(
            &mut buf[OFF_REPLACE_DONE..OFF_REPLACE_DONE + 2],
            marker_raw(self.replace_complete),
        );
        LittleEndian::write_u32(&mut buf[OFF_FILE_CRC..OFF_FILE_CRC + 4], self.crc);
        LittleEndian::write_u16(
            &mut buf[OFF_TMP_FILE..OFF_TMP_FILE + 2],
            marker_raw(!self.tmp_file),
        );
        LittleEndian::write_u16(
            &mut buf[OFF_CREATE_COMPLETE..OFF_CREATE_COMPLETE + 2],
            marker_raw(self.create_complete),
        );
        LittleEndian::write_u16(
            &mut buf[OFF_DELETE_COMPLETE..OFF_DELETE_COMPLETE + 2],
            marker_raw(self.delete_complete),
        );
        buf
    }

    /// Header, extension and name as written at create time.
    pub fn encode_with_name(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FILE_HDR_SIZE + self.name.len());
        out.extend_from_slice(&self.encode());
        out.extend_from_slice(&self.name);
        out
    }

    pub fn expected_crc(&self) -> u32 {
        file_header_crc(
            self.size,
            self.flag2.raw(),
            self.name_len,
            self.replaces.unwrap_or(NO_PAGE),
            &self.name,
        )
    }

    pub fn crc_ok(&self) -> bool {
        self.crc == self.expected_crc()
    }

    pub fn has_name(&self) -> bool {
        self.flag2.is_set(FLAG2_HAS_FILENAME)
    }

    pub fn name_is(&self, name: &str) -> bool {
        self.has_name() && self.name == name.as_bytes()
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Offset of the first data byte within the start page.
    #[inline]
    pub fn data_offset(&self) -> usize {
        FILE_HDR_SIZE + self.name.len()
    }

    /// Still has to retire the file it supersedes.
    pub fn replace_pending(&self) -> bool {
        self.replaces.is_some() && !self.replace_complete
    }

    /// Live: started, not tombstoned.
    pub fn is_live(&self) -> bool {
        self.page.magic_ok() && self.page.is_file_start() && !self.page.is_dead()
    }
}
