use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};

use rebblestore::consts::{PAGE_HDR_SIZE, PAGE_MAGIC};
use rebblestore::metrics::metrics_snapshot;
use rebblestore::{Fs, MemFlash, StorageConfig, StorageError};

const PS: usize = 512;

fn small_cfg() -> StorageConfig {
    StorageConfig::default()
        .with_region_start(0)
        .with_page_size(PS as u32)
        .with_page_count(64)
        .with_erase_size(2048)
}

fn fresh_fs() -> Result<(MemFlash, Fs)> {
    let cfg = small_cfg();
    let flash = MemFlash::for_config(&cfg);
    let fs = Fs::mount(Box::new(flash.clone()), cfg)?;
    fs.format()?;
    Ok((flash, fs))
}

fn remount(flash: &MemFlash) -> Result<Fs> {
    Ok(Fs::mount(Box::new(flash.clone()), small_cfg())?)
}

fn pattern(n: usize, seed: u8) -> Vec<u8> {
    (0..n).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
}

fn put(fs: &Fs, name: &str, data: &[u8]) -> rebblestore::Result<()> {
    let mut fd = fs.create(name, data.len())?;
    fs.write(&mut fd, data)?;
    fs.mark_written(&mut fd)
}

fn magic_of(flash: &MemFlash, pg: usize) -> u16 {
    let raw = flash.contents();
    LittleEndian::read_u16(&raw[pg * PS..pg * PS + 2])
}

/// The filesystem is usable after recovery: a new file goes in and reads back.
fn assert_usable(fs: &Fs) -> Result<()> {
    put(fs, "after", b"still works")?;
    assert_eq!(fs.read_all(&fs.find_file("after")?)?, b"still works");
    Ok(())
}

#[test]
fn create_is_all_or_nothing_at_every_cut() -> Result<()> {
    let data = pattern(1000, 3);
    let mut completed = false;

    for budget in 0..64 {
        let (flash, fs) = fresh_fs()?;
        flash.fail_after(budget);
        let done = put(&fs, "victim", &data).is_ok();
        flash.clear_fault();
        drop(fs);

        let fs = remount(&flash)?;
        assert!(fs.is_valid(), "budget {}", budget);
        let found = match fs.find_file("victim") {
            Ok(f) => {
                assert_eq!(fs.read_all(&f)?, data, "budget {}", budget);
                true
            }
            Err(StorageError::NotFound(_)) => false,
            Err(e) => return Err(e.into()),
        };
        assert_eq!(found, done, "budget {}", budget);

        let st = fs.stats();
        assert_eq!(st.file_start + st.file_cont, if found { 3 } else { 0 });
        assert!(fs.doctor()?.is_clean(), "budget {}", budget);
        assert_usable(&fs)?;

        if done {
            completed = true;
            break;
        }
    }
    assert!(completed);
    Ok(())
}

#[test]
fn replace_never_loses_or_doubles_the_file() -> Result<()> {
    let v1 = pattern(600, 1);
    let v2 = pattern(900, 2);
    let mut completed = false;

    for budget in 0..64 {
        let (flash, fs) = fresh_fs()?;
        put(&fs, "cfg", &v1)?;
        let old = fs.find_file("cfg")?;

        flash.fail_after(budget);
        let done = (|| -> rebblestore::Result<()> {
            let mut fd = fs.create_replacing("cfg", v2.len(), &old)?;
            fs.write(&mut fd, &v2)?;
            fs.mark_written(&mut fd)
        })()
        .is_ok();
        flash.clear_fault();
        drop(fs);

        let fs = remount(&flash)?;
        assert!(fs.is_valid());
        let listed = fs.list_files()?;
        assert_eq!(listed.len(), 1, "budget {}", budget);
        assert_eq!(listed[0].name, "cfg");

        let got = fs.read_all(&fs.find_file("cfg")?)?;
        assert!(got == v1 || got == v2, "budget {}: mixed content", budget);
        if done {
            assert_eq!(got, v2);
        }
        assert_eq!(fs.stats().file_start, 1);
        assert!(fs.doctor()?.is_clean(), "budget {}", budget);

        // a second replacement still works on top of whatever survived
        let cur = fs.find_file("cfg")?;
        let mut fd = fs.create_replacing("cfg", 5, &cur)?;
        fs.write(&mut fd, b"third")?;
        fs.mark_written(&mut fd)?;
        assert_eq!(fs.read_all(&fs.find_file("cfg")?)?, b"third");
        assert_eq!(fs.list_files()?.len(), 1);

        if done {
            completed = true;
            break;
        }
    }
    assert!(completed);
    Ok(())
}

#[test]
fn delete_completes_or_leaves_file_intact() -> Result<()> {
    let data = pattern(1200, 9);
    let mut completed = false;

    for budget in 0..16 {
        let (flash, fs) = fresh_fs()?;
        put(&fs, "doomed", &data)?;
        let file = fs.find_file("doomed")?;

        flash.fail_after(budget);
        let done = fs.delete(&file).is_ok();
        flash.clear_fault();
        drop(fs);

        let fs = remount(&flash)?;
        let st = fs.stats();
        match fs.find_file("doomed") {
            Ok(f) => {
                assert!(!done);
                assert_eq!(fs.read_all(&f)?, data);
            }
            Err(StorageError::NotFound(_)) => {
                assert_eq!(st.file_start + st.file_cont, 0, "budget {}", budget);
            }
            Err(e) => return Err(e.into()),
        }
        assert_usable(&fs)?;

        if done {
            completed = true;
            break;
        }
    }
    assert!(completed);
    Ok(())
}

#[test]
fn legacy_gc_file_blocks_mount_until_format() -> Result<()> {
    let (flash, fs) = fresh_fs()?;
    put(&fs, "GC", &[0u8; 64])?;
    drop(fs);

    let fs = remount(&flash)?;
    assert!(!fs.is_valid());
    assert!(matches!(fs.find_file("GC"), Err(StorageError::NotFound(_))));

    fs.format()?;
    assert!(fs.is_valid());
    assert!(fs.list_files()?.is_empty());
    Ok(())
}

#[test]
fn foreign_magic_on_page_zero_is_unformatted() -> Result<()> {
    let (flash, fs) = fresh_fs()?;
    put(&fs, "x", b"1")?;
    drop(fs);

    flash.poke(0, &[0x34, 0x12])?;
    let fs = remount(&flash)?;
    assert!(!fs.is_valid());

    fs.format()?;
    assert_eq!(magic_of(&flash, 0), PAGE_MAGIC);
    assert!(fs.is_valid());
    Ok(())
}

#[test]
fn blank_headers_are_rewritten_at_mount() -> Result<()> {
    let (flash, fs) = fresh_fs()?;
    drop(fs);

    // an erase that finished without the header rewrite, page 0 included
    flash.poke(0, &[0xFF; PAGE_HDR_SIZE])?;
    flash.poke((9 * PS) as u32, &[0xFF; PAGE_HDR_SIZE])?;

    let fs = remount(&flash)?;
    assert!(fs.is_valid());
    assert_eq!(magic_of(&flash, 0), PAGE_MAGIC);
    assert_eq!(magic_of(&flash, 9), PAGE_MAGIC);
    assert_eq!(fs.stats().clean, 64);
    assert!(metrics_snapshot().fs_mount_repairs >= 2);
    assert_usable(&fs)?;
    Ok(())
}

#[test]
fn foreign_magic_elsewhere_parks_the_page() -> Result<()> {
    let (flash, fs) = fresh_fs()?;
    drop(fs);

    flash.poke((20 * PS) as u32, &[0x34, 0x12])?;
    let fs = remount(&flash)?;
    assert!(fs.is_valid());
    assert_eq!(fs.stats().dirty, 1);
    assert_eq!(fs.doctor()?.bad_magic, vec![20]);
    Ok(())
}

#[test]
fn unreachable_continuation_is_swept() -> Result<()> {
    let (flash, fs) = fresh_fs()?;
    put(&fs, "real", &pattern(700, 5))?;
    drop(fs);

    // page 40 claims to be a continuation nobody links to
    flash.poke((40 * PS + 2) as u32, &[0xFE, 0xF6])?;

    let fs = remount(&flash)?;
    let st = fs.stats();
    assert_eq!(st.file_start, 1);
    assert_eq!(st.file_cont, 1);
    assert_eq!(st.dirty, 1);
    assert!(metrics_snapshot().fs_orphans_swept >= 1);
    assert_eq!(fs.read_all(&fs.find_file("real")?)?, pattern(700, 5));
    Ok(())
}

#[test]
fn doctor_reports_a_broken_link() -> Result<()> {
    let (flash, fs) = fresh_fs()?;
    put(&fs, "chain", &pattern(1000, 7))?;
    let file = fs.find_file("chain")?;
    assert!(fs.doctor()?.is_clean());

    let at = file.start_page as usize * PS + 21;
    let link_crc = flash.contents()[at];
    flash.poke(at as u32, &[!link_crc])?;

    let rep = fs.doctor()?;
    assert_eq!(rep.link_errors, vec![file.start_page]);
    assert!(!rep.is_clean());
    assert!(matches!(
        fs.read_all(&file),
        Err(StorageError::CorruptChain { .. })
    ));

    // at mount the pages behind the broken link are no longer reachable
    fs.remount()?;
    assert_eq!(fs.stats().file_cont, 0);
    Ok(())
}
