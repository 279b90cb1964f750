//! fwupdate-firmware - Firmware targets built on raw MTD access
//!
//! A [`FirmwareTarget`] pairs an owned [`FirmwareImage`] with the flash
//! partition it belongs to:
//!
//! - [`BootloaderTarget`] programs a raw bootloader image
//! - [`EnvironmentTarget`] updates the boot environment, through
//!   `fw_setenv` for assignment scripts and by raw block write for binary
//!   environment images
//!
//! Partition geometry is looked up again on every call; targets never
//! cache it.
//!
//! # Example
//!
//! ```ignore
//! use fwupdate_firmware::{BootloaderTarget, FirmwareImage, FirmwareTarget};
//! use std::path::Path;
//!
//! let image = FirmwareImage::open(Path::new("flash.bin"))?;
//! let mut target = BootloaderTarget::new(image);
//! target.write()?;
//! target.verify()?;
//! ```

pub mod bootloader;
pub mod environment;
pub mod envtool;
pub mod target;

// Re-exports
pub use bootloader::{BootloaderTarget, BOOTLOADER_PARTITION};
pub use environment::{EnvFormat, EnvironmentTarget, ENVIRONMENT_PARTITION};
pub use envtool::{parse_env_script, EnvAssignment, EnvSetter, FwSetEnv, FW_SETENV};
pub use target::{FirmwareImage, FirmwareTarget};
