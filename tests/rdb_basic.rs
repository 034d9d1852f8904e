use anyhow::Result;
use std::sync::Arc;

use rebblestore::config::RDB_ID_TEST;
use rebblestore::{
    BlobStatus, DatabaseDef, Fs, MemFlash, Rdb, RdbConfig, Selector, StorageConfig, StorageError,
};

const BIG_DB: u16 = 7;

fn small_cfg() -> StorageConfig {
    StorageConfig::default()
        .with_region_start(0)
        .with_page_size(512)
        .with_page_count(64)
        .with_erase_size(2048)
}

fn registry_cfg() -> RdbConfig {
    RdbConfig::empty()
        .with_database(DatabaseDef::new(RDB_ID_TEST, "rebble/rdbtest", 1024))
        .with_database(DatabaseDef::new(BIG_DB, "rebble/big", 4096))
}

fn setup() -> Result<(MemFlash, Rdb)> {
    let cfg = small_cfg();
    let flash = MemFlash::for_config(&cfg);
    let fs = Fs::mount(Box::new(flash.clone()), cfg)?;
    fs.format()?;
    let rdb = Rdb::new(Arc::new(fs), registry_cfg())?;
    Ok((flash, rdb))
}

fn key(k: u32) -> [u8; 4] {
    k.to_le_bytes()
}

fn value(k: u32, len: usize) -> Vec<u8> {
    (0..len).map(|i| 0xA5 ^ (i as u8) ^ (k as u8)).collect()
}

#[test]
fn insert_select_delete_scenario() -> Result<()> {
    let (_flash, rdb) = setup()?;
    let db = rdb.open(RDB_ID_TEST)?;

    db.insert(&key(2), &value(2, 16))?;
    db.insert(&key(1), &value(1, 16))?;

    let hits = db.query(&[Selector::key_eq(&key(1)), Selector::project_all()])?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, key(1));
    assert_eq!(hits[0].values, vec![value(1, 16)]);

    let err = db.insert(&key(1), &value(1, 16)).unwrap_err();
    assert_eq!(err, StorageError::Duplicate);
    assert_eq!(err.status(), BlobStatus::InvalidData);
    assert_eq!(db.query(&[Selector::key_eq(&key(1))])?.len(), 1);

    db.delete(&hits[0].iter)?;
    assert!(db.query(&[Selector::key_eq(&key(1))])?.is_empty());

    let two = db.query(&[Selector::key_eq(&key(2)), Selector::project_all()])?;
    assert_eq!(two.len(), 1);
    assert_eq!(two[0].values[0], value(2, 16));

    // the freed key can be inserted again
    db.insert(&key(1), &value(1, 8))?;
    assert_eq!(db.query(&[Selector::key_eq(&key(1))])?.len(), 1);
    Ok(())
}

#[test]
fn iteration_walks_live_records_in_order() -> Result<()> {
    let (_flash, rdb) = setup()?;
    let db = rdb.open(RDB_ID_TEST)?;
    assert!(db.iter_start()?.is_none());

    for k in 0..4 {
        db.insert(&key(k), &value(k, 10 + k as usize))?;
    }
    db.delete_key(&key(1))?;

    let mut seen = Vec::new();
    let mut it = db.iter_start()?.expect("records present");
    loop {
        let mut kb = [0u8; 4];
        assert_eq!(db.read_key(&it, &mut kb)?, 4);
        let k = u32::from_le_bytes(kb);
        assert_eq!(db.value(&it)?, value(k, 10 + k as usize));
        assert_eq!(it.footprint(), 4 + 4 + 10 + k as usize);
        seen.push(k);
        if !db.iter_next(&mut it)? {
            break;
        }
    }
    assert_eq!(seen, vec![0, 2, 3]);
    assert!(!it.is_valid());

    let st = db.stats()?;
    assert_eq!(st.records, 3);
    assert_eq!(st.used_bytes, 18 + 20 + 21);
    // the erased record still occupies its slot until GC
    assert_eq!(st.tail, 18 + 19 + 20 + 21);
    assert_eq!(st.file_size, 1024);
    Ok(())
}

#[test]
fn partial_value_reads() -> Result<()> {
    let (_flash, rdb) = setup()?;
    let db = rdb.open(RDB_ID_TEST)?;
    db.insert(b"k", &value(9, 40))?;

    let it = db.iter_start()?.expect("one record");
    let mut buf = [0u8; 8];
    assert_eq!(db.read_data(&it, 36, &mut buf)?, 4);
    assert_eq!(&buf[..4], &value(9, 40)[36..]);
    assert_eq!(db.read_data(&it, 40, &mut buf)?, 0);
    assert_eq!(db.key(&it)?, b"k");
    Ok(())
}

#[test]
fn update_replaces_the_value() -> Result<()> {
    let (_flash, rdb) = setup()?;
    let db = rdb.open(RDB_ID_TEST)?;
    db.insert(&key(5), &value(5, 16))?;
    db.insert(&key(6), &value(6, 16))?;

    db.update(&key(5), b"fresh")?;
    let hits = db.query(&[Selector::key_eq(&key(5)), Selector::project_all()])?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].values[0], b"fresh");

    let err = db.update(&key(77), b"x").unwrap_err();
    assert_eq!(err.status(), BlobStatus::KeyDoesNotExist);
    // a rejected value leaves the record alone
    assert!(db.update(&key(6), &[0u8; 2048]).is_err());
    assert_eq!(db.query(&[Selector::key_eq(&key(6))])?.len(), 1);
    Ok(())
}

#[test]
fn delete_key_of_missing_record() -> Result<()> {
    let (_flash, rdb) = setup()?;
    let db = rdb.open(RDB_ID_TEST)?;
    // no backing file yet
    assert_eq!(
        BlobStatus::of(&db.delete_key(&key(1))),
        BlobStatus::KeyDoesNotExist
    );
    db.insert(&key(1), b"v")?;
    assert_eq!(BlobStatus::of(&db.delete_key(&key(2))), BlobStatus::KeyDoesNotExist);
    assert_eq!(BlobStatus::of(&db.delete_key(&key(1))), BlobStatus::Success);
    Ok(())
}

#[test]
fn unknown_database_id() -> Result<()> {
    let (_flash, rdb) = setup()?;
    let status = rdb.open(99).err().map(|e| e.status());
    assert_eq!(status, Some(BlobStatus::InvalidDatabaseId));
    assert_eq!(rdb.databases().count(), 2);
    Ok(())
}

#[test]
fn length_limits() -> Result<()> {
    let (_flash, rdb) = setup()?;
    let db = rdb.open(BIG_DB)?;

    assert!(matches!(db.insert(&[], b"v"), Err(StorageError::InvalidData(_))));
    assert!(matches!(
        db.insert(&[1u8; 128], b"v"),
        Err(StorageError::InvalidData(_))
    ));
    assert!(matches!(
        db.insert(b"k", &vec![0u8; 2048]),
        Err(StorageError::InvalidData(_))
    ));

    let k = [0x42u8; 127];
    let v = value(3, 2047);
    db.insert(&k, &v)?;
    let hits = db.query(&[Selector::key_eq(&k), Selector::project_all()])?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].values[0], v);

    // an empty value is a valid record
    db.insert(b"e", &[])?;
    let hits = db.query(&[Selector::key_eq(b"e"), Selector::project_all()])?;
    assert_eq!(hits[0].values[0], Vec::<u8>::new());
    Ok(())
}

#[test]
fn records_survive_remount() -> Result<()> {
    let (flash, rdb) = setup()?;
    {
        let db = rdb.open(RDB_ID_TEST)?;
        db.insert(&key(1), &value(1, 32))?;
        db.insert(&key(2), &value(2, 32))?;
        db.delete_key(&key(1))?;
    }
    drop(rdb);

    let fs = Fs::mount(Box::new(flash), small_cfg())?;
    let rdb = Rdb::new(Arc::new(fs), registry_cfg())?;
    let db = rdb.open(RDB_ID_TEST)?;
    let all = db.query(&[Selector::project_all()])?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].key, key(2));
    assert_eq!(all[0].values[0], value(2, 32));
    Ok(())
}
