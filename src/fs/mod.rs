//! fs: page-chained file system over a NOR flash region.
//!
//! Submodules:
//! - core.rs: `Fs` (device-wide lock) and `FsInner` state, mount/format entry points, stats.
//! - io.rs: page-addressed reads/writes of raw bytes and headers.
//! - mount.rs: page classification and power-loss repair at mount.
//! - alloc.rs: wear-aware page allocation and erase-sector reclaim.
//! - file.rs: `File`/`Fd` cursors: find, open, read, write, seek, subfile.
//! - create.rs: create, atomic replace, mark_written, delete.
//! - doctor.rs: read-only CRC/link audit.
//!
//! Every operation takes the device-wide lock for its whole duration; callers
//! above (rdb) serialize per database on top of that.

pub mod alloc;
pub mod core;
pub mod create;
pub mod doctor;
pub mod file;
pub mod io;
pub mod mount;

pub use self::core::{Fs, FsStats};
pub use doctor::DoctorReport;
pub use file::{DirEntry, Fd, File, Whence};
