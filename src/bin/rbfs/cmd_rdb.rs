use anyhow::{anyhow, Result};
use serde_json::json;
use std::sync::Arc;

use rebblestore::config::RdbConfig;
use rebblestore::error::BlobStatus;
use rebblestore::rdb::{Rdb, Selector};

use crate::cli::DeviceArgs;
use crate::util::{decode_value_arg, display_text, hex_dump, mount_valid, to_hex};

fn registry(dev: &DeviceArgs) -> Result<Rdb> {
    let fs = Arc::new(mount_valid(dev)?);
    Ok(Rdb::new(fs, RdbConfig::default())?)
}

fn db_id(id: u32) -> Result<u16> {
    u16::try_from(id).map_err(|_| anyhow!("database id {} out of range", id))
}

pub fn exec_dump(dev: &DeviceArgs, id: u32, json: bool) -> Result<()> {
    let rdb = registry(dev)?;
    let db = rdb.open(db_id(id)?)?;
    let rows = db.query(&[Selector::project_all()])?;

    if json {
        let items: Vec<_> = rows
            .iter()
            .map(|r| {
                json!({
                    "offset": r.iter.offset(),
                    "key": to_hex(&r.key),
                    "value": to_hex(&r.values[0]),
                })
            })
            .collect();
        println!("{}", serde_json::to_string(&items)?);
        return Ok(());
    }

    println!("Database {} ({})", db.id(), db.filename());
    for r in &rows {
        println!(
            "@{:<6} key={} ({} B value)",
            r.iter.offset(),
            display_text(&r.key),
            r.values[0].len()
        );
        println!("{}", hex_dump(&r.values[0]));
    }
    if let Ok(st) = db.stats() {
        println!(
            "{} record(s), {} B live, tail {} of {} B",
            st.records, st.used_bytes, st.tail, st.file_size
        );
    }
    Ok(())
}

pub fn exec_put(dev: &DeviceArgs, id: u32, key: &str, value: &str, update: bool) -> Result<()> {
    let rdb = registry(dev)?;
    let db = rdb.open(db_id(id)?)?;
    let key = decode_value_arg(key)?;
    let value = decode_value_arg(value)?;
    let res = if update {
        db.update(&key, &value)
    } else {
        db.insert(&key, &value)
    };
    let status = BlobStatus::of(&res);
    res?;
    rdb.fs().sync()?;
    println!("{:?} ({:#04x})", status, status.code());
    Ok(())
}

pub fn exec_del(dev: &DeviceArgs, id: u32, key: &str) -> Result<()> {
    let rdb = registry(dev)?;
    let db = rdb.open(db_id(id)?)?;
    let key = decode_value_arg(key)?;
    db.delete_key(&key)?;
    rdb.fs().sync()?;
    println!("Deleted key {}", display_text(&key));
    Ok(())
}

pub fn exec_compact(dev: &DeviceArgs, id: u32) -> Result<()> {
    let rdb = registry(dev)?;
    let db = rdb.open(db_id(id)?)?;
    let kept = db.compact()?;
    rdb.fs().sync()?;
    println!("Compacted {}: {} B live", db.filename(), kept);
    Ok(())
}
