use anyhow::Result;

use crate::cli::DeviceArgs;
use crate::util::mount;

pub fn exec(dev: &DeviceArgs) -> Result<()> {
    let fs = mount(dev, true)?;
    fs.format()?;
    fs.sync()?;
    let st = fs.stats();
    println!(
        "Formatted {}: {} pages of {} bytes",
        dev.image.display(),
        st.pages,
        st.page_size
    );
    Ok(())
}
