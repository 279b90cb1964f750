//! Boot environment target
//!
//! The payload is either a binary environment image written to the
//! partition as is, or an assignment script applied through
//! [`EnvSetter`]. The caller picks the format; the payload bytes never
//! decide it. Override assignments (variables to preserve across a flash
//! of the default environment) are applied last in both cases.

use crate::envtool::{parse_env_script, EnvAssignment, EnvSetter, FwSetEnv};
use crate::target::{FirmwareImage, FirmwareTarget};
use fwupdate_core::{ErrorCode, Result, UpgradeError};
use fwupdate_mtd::{LinuxMtdIo, MtdDevice, MtdIo};
use log::info;
use std::fs::File;
use std::io::{Read, Seek};

/// MTD partition holding the boot environment
pub const ENVIRONMENT_PARTITION: u32 = 3;

/// How an environment payload is applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvFormat {
    /// Binary environment image, written raw
    #[default]
    Image,
    /// Assignment script, applied with the environment-set utility
    Script,
}

/// Updates the persisted boot environment
pub struct EnvironmentTarget<S = File, I = LinuxMtdIo, E = FwSetEnv> {
    image: FirmwareImage<S>,
    device: MtdDevice<I>,
    setter: E,
    partition: u32,
    format: EnvFormat,
    overrides: Vec<EnvAssignment>,
}

impl<S: Read + Seek> EnvironmentTarget<S, LinuxMtdIo, FwSetEnv> {
    /// Target the live environment partition with `fw_setenv` from `PATH`
    pub fn new(image: FirmwareImage<S>) -> Self {
        Self::with_device(image, MtdDevice::new(), FwSetEnv::new())
    }
}

impl<S: Read + Seek, I: MtdIo, E: EnvSetter> EnvironmentTarget<S, I, E> {
    /// Target the environment partition through `device` and `setter`
    ///
    /// The payload is treated as a binary image unless
    /// [`with_format`](Self::with_format) says otherwise.
    pub fn with_device(image: FirmwareImage<S>, device: MtdDevice<I>, setter: E) -> Self {
        Self {
            image,
            device,
            setter,
            partition: ENVIRONMENT_PARTITION,
            format: EnvFormat::default(),
            overrides: Vec::new(),
        }
    }

    /// Use a board specific partition index
    pub fn with_partition(mut self, partition: u32) -> Self {
        self.partition = partition;
        self
    }

    /// Select how the payload is applied
    pub fn with_format(mut self, format: EnvFormat) -> Self {
        self.format = format;
        self
    }

    /// Assignments applied after the payload
    pub fn with_overrides(mut self, overrides: Vec<EnvAssignment>) -> Self {
        self.overrides = overrides;
        self
    }

    /// MTD partition index this target writes to
    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Payload format
    pub fn format(&self) -> EnvFormat {
        self.format
    }
}

impl<S: Read + Seek, I: MtdIo, E: EnvSetter> FirmwareTarget for EnvironmentTarget<S, I, E> {
    fn write(&mut self) -> Result<()> {
        let info = self.device.get_partition_info(self.partition)?;
        let payload = self.image.read_all()?;

        if payload.is_empty() {
            return Err(UpgradeError::with_code(
                "Environment image is empty",
                ErrorCode::InvalidFirmware,
            ));
        }

        match self.format {
            EnvFormat::Script => {
                let assignments = parse_env_script(&payload)?;
                if assignments.is_empty() {
                    return Err(UpgradeError::with_code(
                        "Environment script contains no assignments",
                        ErrorCode::InvalidFirmware,
                    ));
                }
                info!(
                    "Applying {} environment assignments to {} ({})",
                    assignments.len(),
                    info.device_path.display(),
                    info.name
                );
                self.setter.apply(&assignments)?;
            }
            EnvFormat::Image => {
                info!(
                    "Writing environment image ({} bytes) to {} ({})",
                    payload.len(),
                    info.device_path.display(),
                    info.name
                );
                self.device.write(
                    &info.device_path,
                    info.size,
                    info.erase_size,
                    &mut payload.as_slice(),
                    payload.len() as u64,
                )?;
            }
        }

        if !self.overrides.is_empty() {
            info!("Restoring {} environment overrides", self.overrides.len());
            self.setter.apply(&self.overrides)?;
        }
        Ok(())
    }

    fn read(&self) -> Result<Vec<u8>> {
        let info = self.device.get_partition_info(self.partition)?;
        self.device
            .read(&info.device_path, info.size, info.erase_size, info.size)
    }
}
