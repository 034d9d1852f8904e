use anyhow::Result;

use crate::cli::DeviceArgs;
use crate::util::mount_valid;

pub fn exec(dev: &DeviceArgs, name: &str) -> Result<()> {
    let fs = mount_valid(dev)?;
    let file = fs.find_file(name)?;
    fs.delete(&file)?;
    fs.sync()?;
    println!("Deleted '{}'", name);
    Ok(())
}
