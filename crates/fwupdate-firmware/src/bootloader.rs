//! Bootloader image target

use crate::target::{FirmwareImage, FirmwareTarget};
use fwupdate_core::{ErrorCode, Result, UpgradeError};
use fwupdate_mtd::{LinuxMtdIo, MtdDevice, MtdIo};
use log::info;
use std::fs::File;
use std::io::{Read, Seek};

/// MTD partition holding the bootloader
pub const BOOTLOADER_PARTITION: u32 = 0;

/// Programs a raw bootloader image into its MTD partition
pub struct BootloaderTarget<S = File, I = LinuxMtdIo> {
    image: FirmwareImage<S>,
    device: MtdDevice<I>,
    partition: u32,
}

impl<S: Read + Seek> BootloaderTarget<S, LinuxMtdIo> {
    /// Target the live bootloader partition
    pub fn new(image: FirmwareImage<S>) -> Self {
        Self::with_device(image, MtdDevice::new())
    }
}

impl<S: Read + Seek, I: MtdIo> BootloaderTarget<S, I> {
    /// Target the bootloader partition through `device`
    pub fn with_device(image: FirmwareImage<S>, device: MtdDevice<I>) -> Self {
        Self {
            image,
            device,
            partition: BOOTLOADER_PARTITION,
        }
    }

    /// Use a board specific partition index
    pub fn with_partition(mut self, partition: u32) -> Self {
        self.partition = partition;
        self
    }

    /// MTD partition index this target writes to
    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Compare the partition contents against the image
    ///
    /// Only the first `image.len()` bytes are compared.
    pub fn verify(&mut self) -> Result<()> {
        let info = self.device.get_partition_info(self.partition)?;
        let expected = self.image.read_all()?;
        let actual = self.device.read(
            &info.device_path,
            info.size,
            info.erase_size,
            expected.len() as u64,
        )?;

        if let Some(offset) = expected.iter().zip(&actual).position(|(e, a)| e != a) {
            return Err(UpgradeError::new(format!(
                "Verification of {} failed at offset {:#x}",
                info.device_path.display(),
                offset
            )));
        }
        if actual.len() < expected.len() {
            return Err(UpgradeError::new(format!(
                "Verification of {} failed: read {} of {} bytes",
                info.device_path.display(),
                actual.len(),
                expected.len()
            )));
        }

        info!("Verified {} bytes in {}", expected.len(), info.device_path.display());
        Ok(())
    }
}

impl<S: Read + Seek, I: MtdIo> FirmwareTarget for BootloaderTarget<S, I> {
    fn write(&mut self) -> Result<()> {
        let info = self.device.get_partition_info(self.partition)?;
        let length = self.image.len();
        if length == 0 {
            return Err(UpgradeError::with_code(
                "Bootloader image is empty",
                ErrorCode::InvalidFirmware,
            ));
        }

        info!(
            "Writing bootloader ({} bytes) to {} ({})",
            length,
            info.device_path.display(),
            info.name
        );
        let stream = self.image.rewind()?;
        self.device.write(
            &info.device_path,
            info.size,
            info.erase_size,
            stream,
            length,
        )?;
        Ok(())
    }

    fn read(&self) -> Result<Vec<u8>> {
        let info = self.device.get_partition_info(self.partition)?;
        self.device
            .read(&info.device_path, info.size, info.erase_size, info.size)
    }
}
