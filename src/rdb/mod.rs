//! rdb: append-only key/value record databases, one fs file each.
//!
//! Submodules:
//! - record.rs: on-flash record header and its state classification.
//! - registry.rs: `Rdb` (id -> file, default size, lock) and `DbHandle`.
//! - iter.rs: the validity scan and record iteration.
//! - ops.rs: create, insert, update, delete, stats.
//! - select.rs: filter/projection queries.
//! - gc.rs: compaction into a replacement file.
//!
//! Records are never edited in place beyond clearing flag bits. An insert is
//! four header phases (see ops.rs); any scan over the file skips whatever a
//! power cut left behind, so there is no separate recovery pass.

pub mod gc;
pub mod iter;
pub mod ops;
pub mod record;
pub mod registry;
pub mod select;

pub use iter::RecordIter;
pub use ops::DbStats;
pub use record::{RecordHeader, RecordState};
pub use registry::{DbHandle, Rdb};
pub use select::{compare, Field, Operator, SelectResult, Selector};
