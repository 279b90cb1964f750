//! Firmware target abstraction
//!
//! A [`FirmwareTarget`] owns one [`FirmwareImage`] and knows which flash
//! partition it belongs to. The image stream is closed exactly once, when
//! the target (and with it the image) is dropped.

use fwupdate_core::{ErrorCode, Result, UpgradeError};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// A firmware destination in flash
pub trait FirmwareTarget {
    /// Program the owned image into the target partition
    fn write(&mut self) -> Result<()>;

    /// Read the target partition back
    fn read(&self) -> Result<Vec<u8>>;
}

/// An open, seekable firmware image of known length
#[derive(Debug)]
pub struct FirmwareImage<S = File> {
    stream: S,
    len: u64,
}

impl FirmwareImage<File> {
    /// Open an image file
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            UpgradeError::io(
                format!("Opening firmware image {} failed", path.display()),
                e,
            )
            .coded(ErrorCode::InvalidInput)
        })?;
        Self::from_file(file)
    }

    /// Take ownership of an already open file
    ///
    /// Fails if `file` is not a regular file (a directory handle, a device).
    pub fn from_file(file: File) -> Result<Self> {
        let metadata = file.metadata().map_err(|e| {
            UpgradeError::io("Firmware image is not an open file", e).coded(ErrorCode::InvalidInput)
        })?;
        if !metadata.is_file() {
            return Err(UpgradeError::with_code(
                "Firmware image is not a regular file",
                ErrorCode::InvalidInput,
            ));
        }
        Self::new(file)
    }
}

impl<S: Read + Seek> FirmwareImage<S> {
    /// Take ownership of a stream, measuring its length
    pub fn new(mut stream: S) -> Result<Self> {
        let len = stream
            .seek(SeekFrom::End(0))
            .and_then(|len| stream.seek(SeekFrom::Start(0)).map(|_| len))
            .map_err(|e| {
                UpgradeError::io("Firmware image is not a seekable stream", e)
                    .coded(ErrorCode::InvalidInput)
            })?;

        Ok(Self { stream, len })
    }

    /// Image length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the image is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Position the stream at the start of the image
    pub fn rewind(&mut self) -> Result<&mut S> {
        self.stream
            .seek(SeekFrom::Start(0))
            .map_err(|e| UpgradeError::io("Rewinding firmware image failed", e))?;
        Ok(&mut self.stream)
    }

    /// Read the whole image into memory
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let len = self.len as usize;
        let stream = self.rewind()?;
        let mut data = Vec::with_capacity(len);
        stream
            .read_to_end(&mut data)
            .map_err(|e| UpgradeError::io("Reading firmware image failed", e))?;
        Ok(data)
    }
}
