use anyhow::{anyhow, Result};

use crate::cli::DeviceArgs;
use crate::util::mount;

pub fn exec(dev: &DeviceArgs, json: bool) -> Result<()> {
    let fs = mount(dev, false)?;
    let rep = fs.doctor()?;

    if json {
        println!("{}", serde_json::to_string(&rep)?);
    } else {
        println!("Doctor {}", dev.image.display());
        println!("  valid           = {}", fs.is_valid());
        println!("  pages_total     = {}", rep.pages_total);
        println!("  pages_checked   = {}", rep.pages_checked);
        println!("  live_files      = {}", rep.live_files);
        println!("  bad_magic       = {:?}", rep.bad_magic);
        println!("  page_crc_errors = {:?}", rep.page_crc_errors);
        println!("  link_errors     = {:?}", rep.link_errors);
        println!("  file_crc_errors = {:?}", rep.file_crc_errors);
    }

    if !rep.is_clean() {
        return Err(anyhow!("integrity problems found"));
    }
    Ok(())
}
