use anyhow::Result;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rebblestore::config::{RDB_ID_NOTIFICATION, RDB_ID_TEST};
use rebblestore::{DatabaseDef, Fs, MemFlash, Rdb, RdbConfig, Selector, StorageConfig};

fn setup() -> Result<Arc<Rdb>> {
    let cfg = StorageConfig::default()
        .with_region_start(0)
        .with_page_size(512)
        .with_page_count(64)
        .with_erase_size(2048);
    let flash = MemFlash::for_config(&cfg);
    let fs = Fs::mount(Box::new(flash), cfg)?;
    fs.format()?;
    let reg = RdbConfig::empty()
        .with_database(DatabaseDef::new(RDB_ID_TEST, "rebble/rdbtest", 1024))
        .with_database(DatabaseDef::new(RDB_ID_NOTIFICATION, "rebble/notifstr", 1024));
    Ok(Arc::new(Rdb::new(Arc::new(fs), reg)?))
}

#[test]
fn open_waits_for_the_holder() -> Result<()> {
    let rdb = setup()?;
    let held = rdb.open(RDB_ID_TEST)?;

    let (tx, rx) = mpsc::channel();
    let r2 = Arc::clone(&rdb);
    let waiter = thread::spawn(move || {
        let db = r2.open(RDB_ID_TEST).unwrap();
        tx.send(()).unwrap();
        db.insert(b"from-thread", b"1").unwrap();
    });

    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    // other databases stay available meanwhile
    rdb.open(RDB_ID_NOTIFICATION)?.insert(b"n", b"2")?;

    held.insert(b"from-main", b"0")?;
    Rdb::close(held);
    rx.recv_timeout(Duration::from_secs(10))?;
    waiter.join().expect("waiter panicked");

    let db = rdb.open(RDB_ID_TEST)?;
    assert_eq!(db.query(&[])?.len(), 2);
    Ok(())
}

#[test]
fn parallel_writers_serialize() -> Result<()> {
    let rdb = setup()?;

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let rdb = Arc::clone(&rdb);
            thread::spawn(move || {
                for i in 0..5u32 {
                    let k = (t * 100 + i).to_le_bytes();
                    rdb.open(RDB_ID_TEST).unwrap().insert(&k, &[t as u8; 8]).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("writer panicked");
    }

    let db = rdb.open(RDB_ID_TEST)?;
    let rows = db.query(&[Selector::project_all()])?;
    assert_eq!(rows.len(), 20);
    for r in &rows {
        let k = u32::from_le_bytes([r.key[0], r.key[1], r.key[2], r.key[3]]);
        assert_eq!(r.values[0], vec![(k / 100) as u8; 8]);
    }
    Ok(())
}
