//! Write command implementation

use fwupdate_core::Result;
use fwupdate_firmware::{
    BootloaderTarget, EnvAssignment, EnvFormat, EnvironmentTarget, FirmwareImage, FirmwareTarget,
    FwSetEnv,
};
use fwupdate_mtd::{MtdConfig, MtdDevice};
use std::path::Path;

/// Program a bootloader image
pub fn run_write_bootloader(
    config: MtdConfig,
    input: &Path,
    partition: Option<u32>,
    verify: bool,
) -> Result<()> {
    let image = FirmwareImage::open(input)?;
    let len = image.len();

    let mut target = BootloaderTarget::with_device(image, MtdDevice::with_config(config));
    if let Some(index) = partition {
        target = target.with_partition(index);
    }

    target.write()?;
    if verify {
        target.verify()?;
        println!("Verified {} bytes", len);
    }

    println!("Bootloader updated from {}", input.display());
    Ok(())
}

/// Update the boot environment
pub fn run_write_env(
    config: MtdConfig,
    input: &Path,
    partition: Option<u32>,
    format: EnvFormat,
    setter: FwSetEnv,
    overrides: Vec<EnvAssignment>,
) -> Result<()> {
    let image = FirmwareImage::open(input)?;

    let mut target = EnvironmentTarget::with_device(image, MtdDevice::with_config(config), setter)
        .with_format(format)
        .with_overrides(overrides);
    if let Some(index) = partition {
        target = target.with_partition(index);
    }

    target.write()?;

    println!("Environment updated from {}", input.display());
    Ok(())
}
