//! Read command implementation

use crate::cli::Target;
use fwupdate_core::{ErrorCode, Result, UpgradeError};
use fwupdate_firmware::{BOOTLOADER_PARTITION, ENVIRONMENT_PARTITION};
use fwupdate_mtd::{MtdConfig, MtdDevice};
use std::path::Path;

/// Default partition index of a target
pub(crate) fn default_partition(target: Target) -> u32 {
    match target {
        Target::Bootloader => BOOTLOADER_PARTITION,
        Target::Env => ENVIRONMENT_PARTITION,
    }
}

/// Dump a whole firmware partition to `output`
pub fn run_read(
    config: MtdConfig,
    target: Target,
    partition: Option<u32>,
    output: &Path,
) -> Result<()> {
    let mtd = MtdDevice::with_config(config);
    let index = partition.unwrap_or_else(|| default_partition(target));
    let info = mtd.get_partition_info(index)?;

    let data = mtd.read(&info.device_path, info.size, info.erase_size, info.size)?;

    std::fs::write(output, &data).map_err(|e| {
        UpgradeError::io(format!("Writing {} failed", output.display()), e)
            .coded(ErrorCode::InvalidInput)
    })?;

    println!(
        "Read {} bytes from {} ({}) into {}",
        data.len(),
        info.device_path.display(),
        info.name,
        output.display()
    );
    Ok(())
}
