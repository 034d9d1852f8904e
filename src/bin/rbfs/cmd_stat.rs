use anyhow::Result;
use serde_json::json;

use rebblestore::metrics::metrics_snapshot;

use crate::cli::DeviceArgs;
use crate::util::mount;

pub fn exec(dev: &DeviceArgs, json: bool) -> Result<()> {
    let fs = mount(dev, false)?;
    let st = fs.stats();
    let files = if st.valid { fs.list_files()?.len() } else { 0 };
    let ms = metrics_snapshot();

    if json {
        let v = json!({
            "image": dev.image.display().to_string(),
            "config": {
                "region_start": fs.config().region_start,
                "page_size": fs.config().page_size,
                "page_count": fs.config().page_count,
                "erase_size": fs.config().erase_size,
            },
            "fs": st,
            "files": files,
            "metrics": ms,
        });
        println!("{}", serde_json::to_string(&v)?);
        return Ok(());
    }

    println!("Image {}", dev.image.display());
    println!("  region_start = {:#x}", fs.config().region_start);
    println!("  page_size    = {} bytes", st.page_size);
    println!("  pages        = {}", st.pages);
    println!("  valid        = {}", st.valid);
    println!("  clean        = {}", st.clean);
    println!("  file_start   = {}", st.file_start);
    println!("  file_cont    = {}", st.file_cont);
    println!("  dirty        = {}", st.dirty);
    println!("  frontier     = {}", st.frontier);
    println!("  files        = {}", files);
    println!("Mount I/O");
    println!("  flash_reads  = {} ({} B)", ms.flash_reads, ms.flash_bytes_read);
    println!("  flash_writes = {} ({} B)", ms.flash_writes, ms.flash_bytes_written);
    println!("  repairs      = {}", ms.fs_mount_repairs);
    println!("  orphans      = {}", ms.fs_orphans_swept);
    println!("  gc_runs      = {} (avg {:.1} B copied)", ms.rdb_gc_runs, ms.avg_gc_bytes());
    Ok(())
}
