use anyhow::Result;
use std::sync::Arc;

use rebblestore::config::RDB_ID_TEST;
use rebblestore::rdb::{DbHandle, Operator};
use rebblestore::{DatabaseDef, Fs, MemFlash, Rdb, RdbConfig, Selector, StorageConfig};

fn setup() -> Result<Rdb> {
    let cfg = StorageConfig::default()
        .with_region_start(0)
        .with_page_size(512)
        .with_page_count(64)
        .with_erase_size(2048);
    let flash = MemFlash::for_config(&cfg);
    let fs = Fs::mount(Box::new(flash), cfg)?;
    fs.format()?;
    let reg = RdbConfig::empty().with_database(DatabaseDef::new(RDB_ID_TEST, "rebble/rdbtest", 1024));
    Ok(Rdb::new(Arc::new(fs), reg)?)
}

fn key(k: u32) -> [u8; 4] {
    k.to_le_bytes()
}

/// 16 bytes: a little-endian u16 score (k * 100), then a per-key pattern.
fn value(k: u32) -> Vec<u8> {
    let mut v: Vec<u8> = (0..16).map(|i| 0xA5 ^ (i as u8) ^ (k as u8)).collect();
    v[..2].copy_from_slice(&((k * 100) as u16).to_le_bytes());
    v
}

fn populate(db: &DbHandle<'_>) -> Result<()> {
    for k in 1..=5 {
        db.insert(&key(k), &value(k))?;
    }
    Ok(())
}

fn keys_of(db: &DbHandle<'_>, selectors: &[Selector]) -> Result<Vec<u32>> {
    let mut out: Vec<u32> = db
        .query(selectors)?
        .iter()
        .map(|r| u32::from_le_bytes([r.key[0], r.key[1], r.key[2], r.key[3]]))
        .collect();
    out.sort_unstable();
    Ok(out)
}

#[test]
fn key_filter_returns_exactly_that_record() -> Result<()> {
    let rdb = setup()?;
    let db = rdb.open(RDB_ID_TEST)?;
    populate(&db)?;

    let hits = db.query(&[Selector::key_eq(&key(1)), Selector::project_all()])?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, key(1));
    assert_eq!(hits[0].values, vec![value(1)]);
    assert_eq!(hits[0].iter.data_len(), 16);

    // a key of another width never matches
    assert!(db.query(&[Selector::key_eq(&[1, 0, 0])])?.is_empty());
    Ok(())
}

#[test]
fn value_comparisons_are_little_endian() -> Result<()> {
    let rdb = setup()?;
    let db = rdb.open(RDB_ID_TEST)?;
    populate(&db)?;

    let gt = Selector::value_cmp(0, Operator::Gt, &250u16.to_le_bytes());
    assert_eq!(keys_of(&db, &[gt])?, vec![3, 4, 5]);

    let lt = Selector::value_cmp(0, Operator::Lt, &250u16.to_le_bytes());
    assert_eq!(keys_of(&db, &[lt])?, vec![1, 2]);

    let eq = Selector::value_cmp(0, Operator::Eq, &400u16.to_le_bytes());
    assert_eq!(keys_of(&db, &[eq])?, vec![4]);

    let ne = Selector::value_cmp(0, Operator::Ne, &400u16.to_le_bytes());
    assert_eq!(keys_of(&db, &[ne])?, vec![1, 2, 3, 5]);

    // filters combine: 100 < score < 500
    let both = [
        Selector::value_cmp(0, Operator::Gt, &100u16.to_le_bytes()),
        Selector::value_cmp(0, Operator::Lt, &500u16.to_le_bytes()),
    ];
    assert_eq!(keys_of(&db, &both)?, vec![2, 3, 4]);

    // ordering on fields wider than 4 bytes never matches
    let wide = Selector::value_cmp(0, Operator::Gt, &[0u8; 5]);
    assert!(keys_of(&db, &[wide])?.is_empty());
    Ok(())
}

#[test]
fn projections_come_back_in_list_order() -> Result<()> {
    let rdb = setup()?;
    let db = rdb.open(RDB_ID_TEST)?;
    populate(&db)?;

    let hits = db.query(&[
        Selector::project(2, 4),
        Selector::key_eq(&key(3)),
        Selector::project(0, 2),
        Selector::project_all(),
    ])?;
    assert_eq!(hits.len(), 1);
    let v = value(3);
    assert_eq!(hits[0].values.len(), 3);
    assert_eq!(hits[0].values[0], &v[2..6]);
    assert_eq!(hits[0].values[1], &v[0..2]);
    assert_eq!(hits[0].values[2], v);
    Ok(())
}

#[test]
fn projection_past_the_value_ends_the_query() -> Result<()> {
    let rdb = setup()?;
    let db = rdb.open(RDB_ID_TEST)?;
    db.insert(&key(9), &[0u8; 32])?;
    db.insert(&key(1), &[1u8; 8])?;
    db.insert(&key(2), &[2u8; 32])?;

    // key 1 is too short for bytes 20..28; key 2 is never reached
    let hits = db.query(&[Selector::project(20, 8)])?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, key(9));

    // a filter that excludes the short record lets the query finish
    let hits = db.query(&[
        Selector::value_cmp(0, Operator::Ne, &[1]),
        Selector::project(20, 8),
    ])?;
    assert_eq!(hits.len(), 2);
    Ok(())
}

#[test]
fn select_starts_at_the_given_record() -> Result<()> {
    let rdb = setup()?;
    let db = rdb.open(RDB_ID_TEST)?;
    populate(&db)?;

    let mut it = db.iter_start()?.expect("records present");
    db.iter_next(&mut it)?;
    db.iter_next(&mut it)?;
    let rest = db.select(&mut it, &[])?;
    assert_eq!(rest.len(), 3);
    assert!(rest.iter().all(|r| r.values.is_empty()));
    assert!(!it.is_valid());
    Ok(())
}

#[test]
fn erased_records_are_invisible() -> Result<()> {
    let rdb = setup()?;
    let db = rdb.open(RDB_ID_TEST)?;
    populate(&db)?;
    db.delete_key(&key(2))?;
    db.delete_key(&key(4))?;

    assert_eq!(keys_of(&db, &[])?, vec![1, 3, 5]);
    let gt = Selector::value_cmp(0, Operator::Gt, &0u16.to_le_bytes());
    assert_eq!(keys_of(&db, &[gt])?, vec![1, 3, 5]);
    Ok(())
}
