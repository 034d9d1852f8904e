use anyhow::Result;

use crate::cli::DeviceArgs;
use crate::util::mount_valid;

pub fn exec(dev: &DeviceArgs, json: bool) -> Result<()> {
    let fs = mount_valid(dev)?;
    let files = fs.list_files()?;
    if json {
        println!("{}", serde_json::to_string(&files)?);
        return Ok(());
    }
    for e in &files {
        println!(
            "{:>8}  page {:>5}  {}",
            e.file.size, e.file.start_page, e.name
        );
    }
    println!("{} file(s)", files.len());
    Ok(())
}
