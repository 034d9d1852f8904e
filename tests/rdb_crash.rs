use anyhow::Result;
use std::sync::Arc;

use rebblestore::config::RDB_ID_TEST;
use rebblestore::{DatabaseDef, Fs, MemFlash, Rdb, RdbConfig, Selector, StorageConfig};

fn small_cfg() -> StorageConfig {
    StorageConfig::default()
        .with_region_start(0)
        .with_page_size(512)
        .with_page_count(64)
        .with_erase_size(2048)
}

fn registry_cfg() -> RdbConfig {
    RdbConfig::empty().with_database(DatabaseDef::new(RDB_ID_TEST, "rebble/rdbtest", 1024))
}

fn fresh() -> Result<(MemFlash, Rdb)> {
    let cfg = small_cfg();
    let flash = MemFlash::for_config(&cfg);
    let fs = Fs::mount(Box::new(flash.clone()), cfg)?;
    fs.format()?;
    Ok((flash, Rdb::new(Arc::new(fs), registry_cfg())?))
}

/// Power back on: a new filesystem instance over the same flash.
fn reboot(flash: &MemFlash) -> Result<Rdb> {
    let fs = Fs::mount(Box::new(flash.clone()), small_cfg())?;
    assert!(fs.is_valid());
    Ok(Rdb::new(Arc::new(fs), registry_cfg())?)
}

fn key(k: u32) -> [u8; 4] {
    k.to_le_bytes()
}

fn value(k: u32, len: usize) -> Vec<u8> {
    (0..len).map(|i| 0xA5 ^ (i as u8) ^ (k as u8)).collect()
}

fn lookup(rdb: &Rdb, k: u32) -> Result<Vec<Vec<u8>>> {
    let db = rdb.open(RDB_ID_TEST)?;
    let hits = db.query(&[Selector::key_eq(&key(k)), Selector::project_all()])?;
    Ok(hits.into_iter().map(|mut r| r.values.remove(0)).collect())
}

#[test]
fn interrupted_insert_is_never_returned() -> Result<()> {
    let mut completed = false;

    for budget in 0..16 {
        let (flash, rdb) = fresh()?;
        rdb.open(RDB_ID_TEST)?.insert(&key(2), &value(2, 16))?;

        flash.fail_after(budget);
        let done = rdb.open(RDB_ID_TEST)?.insert(&key(1), &value(1, 40)).is_ok();
        flash.clear_fault();
        drop(rdb);

        let rdb = reboot(&flash)?;
        let one = lookup(&rdb, 1)?;
        if done {
            assert_eq!(one, vec![value(1, 40)]);
        } else {
            assert!(one.is_empty(), "budget {}: partial record visible", budget);
        }
        assert_eq!(lookup(&rdb, 2)?, vec![value(2, 16)]);

        // the slot left behind does not get in the way of later inserts
        {
            let db = rdb.open(RDB_ID_TEST)?;
            db.insert(&key(3), &value(3, 24))?;
            if !done {
                db.insert(&key(1), &value(1, 40))?;
            }
        }
        assert_eq!(lookup(&rdb, 3)?, vec![value(3, 24)]);
        assert_eq!(lookup(&rdb, 1)?, vec![value(1, 40)]);

        if done {
            completed = true;
            break;
        }
    }
    assert!(completed);
    Ok(())
}

#[test]
fn interrupted_gc_loses_nothing() -> Result<()> {
    let mut completed = false;

    for budget in 0..200 {
        let (flash, rdb) = fresh()?;
        {
            let db = rdb.open(RDB_ID_TEST)?;
            for k in 0..7 {
                db.insert(&key(k), &value(k, 128))?;
            }
            db.delete_key(&key(0))?;
        }

        // needs a compaction first
        flash.fail_after(budget);
        let done = rdb.open(RDB_ID_TEST)?.insert(&key(7), &value(7, 128)).is_ok();
        flash.clear_fault();
        drop(rdb);

        let rdb = reboot(&flash)?;
        assert_eq!(rdb.fs().list_files()?.len(), 1, "budget {}", budget);
        for k in 1..7 {
            assert_eq!(lookup(&rdb, k)?, vec![value(k, 128)], "budget {} key {}", budget, k);
        }
        assert!(lookup(&rdb, 0)?.is_empty());
        let seven = lookup(&rdb, 7)?;
        if done {
            assert_eq!(seven, vec![value(7, 128)]);
        } else {
            assert!(seven.is_empty() || seven == vec![value(7, 128)]);
        }
        assert!(rdb.fs().doctor()?.is_clean());

        if done {
            completed = true;
            break;
        }
    }
    assert!(completed);
    Ok(())
}
