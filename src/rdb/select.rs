//! rdb/select: declarative filters and projections over records.
//!
//! A selector list holds filters and projections in any order. For each valid
//! record every filter is evaluated in list order, stopping at the first that
//! fails; a record passing all of them yields one `SelectResult` carrying a
//! copy of its key and one buffer per projection, in list order.
//!
//! `>` and `<` compare fields of at most 4 bytes as unsigned little-endian
//! integers; on wider fields they never match.

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};

use crate::error::Result;

use super::iter::RecordIter;
use super::registry::DbHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The whole key; matches only keys of exactly the filter's size.
    Key,
    /// `size` bytes of the value at `offset`.
    Value { offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Filter {
        field: Field,
        size: usize,
        op: Operator,
        value: Vec<u8>,
    },
    Project {
        offset: usize,
        size: usize,
    },
    ProjectAll,
}

impl Selector {
    pub fn key_eq(key: &[u8]) -> Self {
        Selector::Filter {
            field: Field::Key,
            size: key.len(),
            op: Operator::Eq,
            value: key.to_vec(),
        }
    }

    pub fn value_cmp(offset: usize, op: Operator, value: &[u8]) -> Self {
        Selector::Filter {
            field: Field::Value { offset },
            size: value.len(),
            op,
            value: value.to_vec(),
        }
    }

    pub fn project(offset: usize, size: usize) -> Self {
        Selector::Project { offset, size }
    }

    pub fn project_all() -> Self {
        Selector::ProjectAll
    }
}

/// One matching record. Buffers are owned; dropping the result releases them.
#[derive(Debug, Clone)]
pub struct SelectResult {
    pub iter: RecordIter,
    pub key: Vec<u8>,
    pub values: Vec<Vec<u8>>,
}

/// Compare a record field against a filter value of the same width.
pub fn compare(op: Operator, field: &[u8], value: &[u8]) -> bool {
    match op {
        Operator::Eq => field == value,
        Operator::Ne => field != value,
        Operator::Gt | Operator::Lt => {
            let w = field.len();
            if w == 0 || w > 4 || value.len() != w {
                return false;
            }
            let a = LittleEndian::read_uint(field, w);
            let b = LittleEndian::read_uint(value, w);
            if op == Operator::Gt {
                a > b
            } else {
                a < b
            }
        }
    }
}

/// `Vec` of `len` zeroed bytes, or `None` if the allocation fails.
fn try_buf(len: usize) -> Option<Vec<u8>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).ok()?;
    v.resize(len, 0);
    Some(v)
}

enum Built {
    Done(SelectResult),
    /// A projection fell outside the record's value.
    Short,
    OutOfMemory,
}

impl DbHandle<'_> {
    fn passes(&self, it: &RecordIter, selectors: &[Selector]) -> Result<bool> {
        for sel in selectors {
            let Selector::Filter {
                field,
                size,
                op,
                value,
            } = sel
            else {
                continue;
            };
            if value.len() < *size {
                return Ok(false);
            }
            let mut prop = vec![0u8; *size];
            let got = match field {
                Field::Key => {
                    if it.key_len != *size {
                        return Ok(false);
                    }
                    self.read_key(it, &mut prop)?
                }
                Field::Value { offset } => self.read_data(it, *offset, &mut prop)?,
            };
            if got != *size || !compare(*op, &prop, &value[..*size]) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn build(&self, it: &RecordIter, selectors: &[Selector]) -> Result<Built> {
        let Some(mut key) = try_buf(it.key_len) else {
            return Ok(Built::OutOfMemory);
        };
        let n = self.read_key(it, &mut key)?;
        key.truncate(n);

        let nproj = selectors
            .iter()
            .filter(|s| !matches!(s, Selector::Filter { .. }))
            .count();
        let mut values = Vec::new();
        if values.try_reserve_exact(nproj).is_err() {
            return Ok(Built::OutOfMemory);
        }
        for sel in selectors {
            let (offset, size) = match sel {
                Selector::Filter { .. } => continue,
                Selector::Project { offset, size } => (*offset, *size),
                Selector::ProjectAll => (0, it.data_len),
            };
            let Some(mut buf) = try_buf(size) else {
                return Ok(Built::OutOfMemory);
            };
            if self.read_data(it, offset, &mut buf)? != size {
                return Ok(Built::Short);
            }
            values.push(buf);
        }
        Ok(Built::Done(SelectResult {
            iter: *it,
            key,
            values,
        }))
    }

    /// Run `selectors` over `it` and every valid record after it. Leaves `it`
    /// exhausted unless the query stops early: a matching record whose
    /// projection falls outside its value, or running out of memory, ends the
    /// query and the results gathered before that record are returned.
    pub fn select(&self, it: &mut RecordIter, selectors: &[Selector]) -> Result<Vec<SelectResult>> {
        let mut out: Vec<SelectResult> = Vec::new();
        while it.valid {
            if self.passes(it, selectors)? {
                match self.build(it, selectors)? {
                    Built::Done(r) => {
                        if out.try_reserve(1).is_err() {
                            warn!("rdb: select out of memory after {} results", out.len());
                            return Ok(out);
                        }
                        out.push(r);
                    }
                    Built::Short => {
                        debug!(
                            "rdb: select stopped at {}: projection outside the value",
                            it.offset()
                        );
                        return Ok(out);
                    }
                    Built::OutOfMemory => {
                        warn!("rdb: select out of memory after {} results", out.len());
                        return Ok(out);
                    }
                }
            }
            self.iter_next(it)?;
        }
        Ok(out)
    }

    /// `select` from the first record; empty if the database has no records.
    pub fn query(&self, selectors: &[Selector]) -> Result<Vec<SelectResult>> {
        match self.iter_start()? {
            Some(mut it) => self.select(&mut it, selectors),
            None => Ok(Vec::new()),
        }
    }
}
