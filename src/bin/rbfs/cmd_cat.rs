use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;

use crate::cli::DeviceArgs;
use crate::util::mount_valid;

pub fn exec(dev: &DeviceArgs, name: &str, out: Option<PathBuf>) -> Result<()> {
    let fs = mount_valid(dev)?;
    let file = fs.find_file(name)?;
    let bytes = fs.read_all(&file)?;
    match out {
        Some(p) => {
            std::fs::write(&p, &bytes).with_context(|| format!("write {}", p.display()))?;
            println!("Wrote {} bytes to {}", bytes.len(), p.display());
        }
        None => {
            std::io::stdout().write_all(&bytes)?;
        }
    }
    Ok(())
}
