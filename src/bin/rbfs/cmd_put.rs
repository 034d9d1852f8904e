use anyhow::{anyhow, Result};

use rebblestore::error::StorageError;

use crate::cli::DeviceArgs;
use crate::util::{decode_value_arg, mount_valid};

pub fn exec(dev: &DeviceArgs, name: &str, value: &str, size: Option<usize>) -> Result<()> {
    let bytes = decode_value_arg(value)?;
    let size = size.unwrap_or(bytes.len());
    if size < bytes.len() {
        return Err(anyhow!("--size {} smaller than value ({} bytes)", size, bytes.len()));
    }

    let fs = mount_valid(dev)?;
    let mut fd = match fs.find_file(name) {
        Ok(old) => fs.create_replacing(name, size, &old)?,
        Err(StorageError::NotFound(_)) => fs.create(name, size)?,
        Err(e) => return Err(e.into()),
    };
    let n = fs.write(&mut fd, &bytes)?;
    fs.mark_written(&mut fd)?;
    fs.sync()?;
    println!("Stored '{}' ({} of {} bytes written)", name, n, size);
    Ok(())
}
