//! Raw MTD partition access
//!
//! [`MtdDevice`] resolves partition geometry from sysfs and moves bytes
//! between a firmware stream and a `/dev/mtdN` node. It holds no device
//! state: every call opens its own handle and the handle is closed on all
//! exit paths when it goes out of scope.

use crate::io::{AccessMode, LinuxMtdIo, MtdHandle, MtdIo};
use crate::sysfs::{read_sysfs_int, read_sysfs_string};
use fwupdate_core::{ErrorCode, Result, UpgradeError};
use log::{debug, info, warn};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Sysfs root for MTD devices
pub const MTD_SYSFS_ROOT: &str = "/sys/class/mtd";

/// Device root
pub const DEV_ROOT: &str = "/dev";

/// The erased value for flash memory (all bits set)
pub const ERASED_VALUE: u8 = 0xFF;

/// Where partition metadata and device nodes are looked up
#[derive(Debug, Clone)]
pub struct MtdConfig {
    /// Directory holding one `mtdN` entry per partition
    pub sysfs_root: PathBuf,
    /// Directory holding the `mtdN` device nodes
    pub dev_root: PathBuf,
}

impl Default for MtdConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from(MTD_SYSFS_ROOT),
            dev_root: PathBuf::from(DEV_ROOT),
        }
    }
}

impl MtdConfig {
    /// Use a different sysfs root
    pub fn sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    /// Use a different device node root
    pub fn dev_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.dev_root = root.into();
        self
    }
}

/// Geometry of one MTD partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    /// Device node, `/dev/mtd<index>`
    pub device_path: PathBuf,
    /// Total size in bytes
    pub size: u64,
    /// Erase block size in bytes
    pub erase_size: u64,
    /// Partition name
    pub name: String,
}

/// Outcome of a successful [`MtdDevice::write`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Blocks that had to be erased before programming
    pub blocks_erased: usize,
    /// Blocks that already read as erased
    pub blocks_skipped: usize,
    /// Bytes programmed
    pub bytes_written: usize,
}

/// Check whether a block reads as fully erased
#[inline]
pub fn is_erased(block: &[u8]) -> bool {
    block.iter().all(|&b| b == ERASED_VALUE)
}

/// Stateless MTD partition helper
#[derive(Debug, Clone, Default)]
pub struct MtdDevice<I = LinuxMtdIo> {
    config: MtdConfig,
    io: I,
}

impl MtdDevice<LinuxMtdIo> {
    /// Helper for the live system (`/sys/class/mtd`, `/dev`)
    pub fn new() -> Self {
        Self::default()
    }

    /// Helper for the live device nodes with a custom configuration
    pub fn with_config(config: MtdConfig) -> Self {
        Self::with_io(config, LinuxMtdIo)
    }
}

impl<I: MtdIo> MtdDevice<I> {
    /// Helper using an explicit backend
    pub fn with_io(config: MtdConfig, io: I) -> Self {
        Self { config, io }
    }

    /// Look up partition `index` in the MTD partition table
    ///
    /// # Errors
    /// Returns an error if:
    /// - The partition doesn't exist
    /// - `size`, `erasesize` or `name` cannot be read
    /// - A numeric attribute is not a number
    /// - The geometry is inconsistent (`size < erasesize` or `erasesize == 0`)
    pub fn get_partition_info(&self, index: u32) -> Result<PartitionInfo> {
        let sysfs_path = self.config.sysfs_root.join(format!("mtd{}", index));

        if !sysfs_path.is_dir() {
            return Err(UpgradeError::with_code(
                format!(
                    "MTD partition {} not found ({})",
                    index,
                    sysfs_path.display()
                ),
                ErrorCode::InvalidInput,
            ));
        }

        let size = read_sysfs_int(&sysfs_path, "size")?;
        let erase_size = read_sysfs_int(&sysfs_path, "erasesize")?;
        let name = read_sysfs_string(&sysfs_path, "name")?;
        let device_path = self.config.dev_root.join(format!("mtd{}", index));

        check_geometry(&device_path, size, erase_size)?;

        if !erase_size.is_power_of_two() {
            warn!(
                "MTD{} erase size {} is not a power of 2",
                index, erase_size
            );
        }
        if size % erase_size != 0 {
            warn!(
                "MTD{} size {} is not a multiple of the erase size {}",
                index, size, erase_size
            );
        }

        debug!(
            "MTD{}: name='{}', size={}, erase_size={}",
            index, name, size, erase_size
        );

        Ok(PartitionInfo {
            device_path,
            size,
            erase_size,
            name,
        })
    }

    /// Read up to `length` bytes (bounded by `size`) from the start of `path`
    ///
    /// Reads stop early if the device ends before `length` bytes.
    pub fn read(&self, path: &Path, size: u64, erase_size: u64, length: u64) -> Result<Vec<u8>> {
        check_geometry(path, size, erase_size)?;

        let length = length.min(size) as usize;
        let mut handle = self.open(path, AccessMode::ReadOnly)?;

        // Read in chunks of one erase block
        let chunk = erase_size as usize;
        let mut data = vec![0u8; length];
        let mut filled = 0;

        while filled < length {
            let end = (filled + chunk).min(length);
            match handle.read(&mut data[filled..end]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(UpgradeError::io(
                        format!("Reading {} at offset {:#x} failed", path.display(), filled),
                        e,
                    ))
                }
            }
        }

        if filled < length {
            warn!(
                "{} ended after {} of {} requested bytes",
                path.display(),
                filled,
                length
            );
        }
        data.truncate(filled);

        info!("Read {} bytes from {}", filled, path.display());
        Ok(data)
    }

    /// Program `length` bytes from `source` into `path`, block by block
    ///
    /// Each erase block the image spans is read first and erased only if it
    /// does not already read as [`ERASED_VALUE`]. The first failure aborts
    /// the remaining blocks; calling `write` again with the same image is
    /// safe.
    pub fn write<R: Read + ?Sized>(
        &self,
        path: &Path,
        size: u64,
        erase_size: u64,
        source: &mut R,
        length: u64,
    ) -> Result<WriteStats> {
        check_geometry(path, size, erase_size)?;

        if length > size {
            return Err(UpgradeError::with_code(
                format!(
                    "Image of {} bytes does not fit into {} ({} bytes)",
                    length,
                    path.display(),
                    size
                ),
                ErrorCode::InvalidFirmware,
            ));
        }

        let mut handle = self.open(path, AccessMode::ReadWrite)?;
        let mut stats = WriteStats::default();
        let mut current = vec![0u8; erase_size as usize];
        let mut chunk = Vec::with_capacity(erase_size as usize);
        let mut offset = 0u64;

        while offset < length {
            let block_len = erase_size.min(size - offset) as usize;
            let chunk_len = erase_size.min(length - offset);

            handle.read_exact(&mut current[..block_len]).map_err(|e| {
                UpgradeError::io(
                    format!("Reading {} at offset {:#x} failed", path.display(), offset),
                    e,
                )
            })?;

            // Pull the image chunk before touching the block so a short
            // image never leaves an erased block behind.
            chunk.clear();
            Read::take(&mut *source, chunk_len)
                .read_to_end(&mut chunk)
                .map_err(|e| {
                    UpgradeError::io(
                        format!("Reading firmware image at offset {:#x} failed", offset),
                        e,
                    )
                })?;
            if (chunk.len() as u64) < chunk_len {
                return Err(UpgradeError::with_code(
                    format!(
                        "Firmware image ended after {} of {} bytes",
                        offset + chunk.len() as u64,
                        length
                    ),
                    ErrorCode::InvalidFirmware,
                ));
            }

            if is_erased(&current[..block_len]) {
                debug!("Block at {:#x} already erased, skipping erase", offset);
                stats.blocks_skipped += 1;
            } else {
                erase_block(&mut handle, path, offset, block_len)?;
                stats.blocks_erased += 1;
            }

            handle.seek(SeekFrom::Start(offset)).map_err(|e| {
                UpgradeError::io(
                    format!("Seeking {} to offset {:#x} failed", path.display(), offset),
                    e,
                )
            })?;

            handle.write_all(&chunk).map_err(|e| {
                UpgradeError::io(
                    format!(
                        "Writing {} bytes to {} at offset {:#x} failed",
                        chunk.len(),
                        path.display(),
                        offset
                    ),
                    e,
                )
            })?;
            stats.bytes_written += chunk.len();

            offset += erase_size;
        }

        handle.flush().map_err(|e| {
            UpgradeError::io(format!("Flushing {} failed", path.display()), e)
        })?;

        info!(
            "Wrote {} bytes to {} ({} blocks erased, {} already blank)",
            stats.bytes_written,
            path.display(),
            stats.blocks_erased,
            stats.blocks_skipped
        );
        Ok(stats)
    }

    fn open(&self, path: &Path, mode: AccessMode) -> Result<I::Handle> {
        debug!("Opening {} ({:?})", path.display(), mode);
        self.io
            .open(path, mode)
            .map_err(|e| UpgradeError::io(format!("Opening {} failed", path.display()), e))
    }
}

fn check_geometry(path: &Path, size: u64, erase_size: u64) -> Result<()> {
    if erase_size == 0 || size < erase_size {
        return Err(UpgradeError::with_code(
            format!(
                "Invalid geometry for {}: size {} bytes, erase size {} bytes",
                path.display(),
                size,
                erase_size
            ),
            ErrorCode::InvalidInput,
        ));
    }
    Ok(())
}

fn erase_block<H: MtdHandle>(handle: &mut H, path: &Path, offset: u64, len: usize) -> Result<()> {
    let out_of_range = || {
        UpgradeError::new(format!(
            "Erase of {} at offset {:#x} exceeds the 32-bit erase range",
            path.display(),
            offset
        ))
    };
    let start = u32::try_from(offset).map_err(|_| out_of_range())?;
    let length = u32::try_from(len).map_err(|_| out_of_range())?;

    debug!("Erasing {} bytes at {:#x}", length, start);
    handle.erase(start, length).map_err(|e| {
        UpgradeError::io(
            format!(
                "Erasing {} bytes of {} at offset {:#x} failed",
                length,
                path.display(),
                start
            ),
            e,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::{populate_sysfs, DummyMtd};
    use std::io::Cursor;

    const DEV: &str = "/dev/mtd0";

    fn dummy_device(mtd: &DummyMtd) -> MtdDevice<DummyMtd> {
        MtdDevice::with_io(MtdConfig::default(), mtd.clone())
    }

    fn sysfs_device(root: &Path) -> MtdDevice<DummyMtd> {
        MtdDevice::with_io(MtdConfig::default().sysfs_root(root), DummyMtd::new(0))
    }

    #[test]
    fn test_get_partition_info() {
        let root = tempfile::tempdir().unwrap();
        populate_sysfs(root.path(), 0, "123", "123", "123").unwrap();

        let info = sysfs_device(root.path()).get_partition_info(0).unwrap();
        assert_eq!(info.device_path, Path::new("/dev/mtd0"));
        assert_eq!(info.size, 123);
        assert_eq!(info.erase_size, 123);
        assert_eq!(info.name, "123");
    }

    #[test]
    fn test_get_partition_info_by_index() {
        let root = tempfile::tempdir().unwrap();
        populate_sysfs(root.path(), 0, "0x100000", "0x10000", "ospi.tiboot3").unwrap();
        populate_sysfs(root.path(), 3, "131072", "65536", "ospi.env").unwrap();

        let info = sysfs_device(root.path()).get_partition_info(3).unwrap();
        assert_eq!(info.device_path, Path::new("/dev/mtd3"));
        assert_eq!(info.size, 128 * 1024);
        assert_eq!(info.erase_size, 64 * 1024);
        assert_eq!(info.name, "ospi.env");
    }

    #[test]
    fn test_get_partition_info_missing_index() {
        let root = tempfile::tempdir().unwrap();
        populate_sysfs(root.path(), 0, "123", "123", "123").unwrap();

        let err = sysfs_device(root.path()).get_partition_info(7).unwrap_err();
        assert!(err.to_string().contains("MTD partition 7 not found"));
        assert_eq!(err.code(), ErrorCode::InvalidInput);
    }

    #[test]
    fn test_get_partition_info_missing_attribute() {
        let root = tempfile::tempdir().unwrap();
        populate_sysfs(root.path(), 0, "123", "123", "123").unwrap();
        std::fs::remove_file(root.path().join("mtd0/name")).unwrap();

        let err = sysfs_device(root.path()).get_partition_info(0).unwrap_err();
        assert!(err.to_string().contains("Failed to read sysfs attribute"));
    }

    #[test]
    fn test_get_partition_info_non_numeric() {
        let root = tempfile::tempdir().unwrap();
        populate_sysfs(root.path(), 0, "123", "unknown", "123").unwrap();

        let err = sysfs_device(root.path()).get_partition_info(0).unwrap_err();
        assert!(err.to_string().contains("Failed to parse sysfs attribute"));
    }

    #[test]
    fn test_get_partition_info_bad_geometry() {
        let root = tempfile::tempdir().unwrap();
        populate_sysfs(root.path(), 0, "4096", "0", "empty").unwrap();
        populate_sysfs(root.path(), 1, "4096", "65536", "tiny").unwrap();

        let device = sysfs_device(root.path());
        assert!(device.get_partition_info(0).is_err());
        assert!(device.get_partition_info(1).is_err());
    }

    #[test]
    fn test_write_blank_block_skips_erase() {
        let mtd = DummyMtd::new(123);
        let payload = vec![0x5Au8; 123];

        let stats = dummy_device(&mtd)
            .write(Path::new(DEV), 123, 123, &mut Cursor::new(&payload), 123)
            .unwrap();

        assert_eq!(mtd.opened(), vec![(PathBuf::from(DEV), AccessMode::ReadWrite)]);
        assert_eq!(mtd.read_count(), 1);
        assert_eq!(mtd.erase_count(), 0);
        assert_eq!(mtd.seek_count(), 1);
        assert_eq!(mtd.program_count(), 1);
        assert_eq!(mtd.close_count(), 1);
        assert_eq!(
            stats,
            WriteStats {
                blocks_erased: 0,
                blocks_skipped: 1,
                bytes_written: 123,
            }
        );
        assert_eq!(mtd.data(), payload);
    }

    #[test]
    fn test_write_dirty_block_erases_once() {
        let mtd = DummyMtd::with_data(&[0x00u8; 123]);
        let payload = vec![0xA5u8; 123];

        let stats = dummy_device(&mtd)
            .write(Path::new(DEV), 123, 123, &mut Cursor::new(&payload), 123)
            .unwrap();

        assert_eq!(mtd.erases(), vec![(0, 123)]);
        assert_eq!(mtd.program_count(), 1);
        assert_eq!(stats.blocks_erased, 1);
        assert_eq!(stats.blocks_skipped, 0);
        assert_eq!(mtd.data(), payload);
    }

    #[test]
    fn test_write_erases_only_dirty_blocks() {
        let mut initial = vec![ERASED_VALUE; 4 * 16];
        initial[16 + 3] = 0x00;
        initial[3 * 16] = 0x7F;
        let mtd = DummyMtd::with_data(&initial);
        let payload: Vec<u8> = (0..64u8).collect();

        let stats = dummy_device(&mtd)
            .write(Path::new(DEV), 64, 16, &mut Cursor::new(&payload), 64)
            .unwrap();

        assert_eq!(mtd.erases(), vec![(16, 16), (48, 16)]);
        assert_eq!(stats.blocks_erased, 2);
        assert_eq!(stats.blocks_skipped, 2);
        assert_eq!(stats.bytes_written, 64);
        assert_eq!(mtd.data(), payload);
    }

    #[test]
    fn test_write_partial_last_block() {
        let mtd = DummyMtd::with_data(&[0u8; 64]);
        let payload = vec![0x11u8; 40];

        let stats = dummy_device(&mtd)
            .write(Path::new(DEV), 64, 16, &mut Cursor::new(&payload), 40)
            .unwrap();

        // The last block is erased as a whole but only 8 bytes are programmed
        assert_eq!(mtd.erases(), vec![(0, 16), (16, 16), (32, 16)]);
        assert_eq!(stats.bytes_written, 40);
        let data = mtd.data();
        assert_eq!(&data[..40], payload.as_slice());
        assert!(is_erased(&data[40..48]));
        assert!(data[48..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_twice_is_idempotent() {
        let mtd = DummyMtd::new(64);
        let payload = vec![0x3Cu8; 64];
        let device = dummy_device(&mtd);

        device
            .write(Path::new(DEV), 64, 16, &mut Cursor::new(&payload), 64)
            .unwrap();
        device
            .write(Path::new(DEV), 64, 16, &mut Cursor::new(&payload), 64)
            .unwrap();

        assert_eq!(mtd.erase_count(), 4);
        assert_eq!(mtd.data(), payload);
        assert_eq!(mtd.open_count(), 2);
        assert_eq!(mtd.close_count(), 2);
    }

    #[test]
    fn test_round_trip() {
        let mtd = DummyMtd::with_data(&[0x42u8; 256]);
        let device = dummy_device(&mtd);
        let payload = b"test data".to_vec();

        device
            .write(Path::new(DEV), 256, 128, &mut Cursor::new(&payload), payload.len() as u64)
            .unwrap();
        let result = device
            .read(Path::new(DEV), 256, 128, payload.len() as u64)
            .unwrap();

        assert_eq!(result, payload);
    }

    #[test]
    fn test_read() {
        let mut initial = b"test data".to_vec();
        initial.resize(123, ERASED_VALUE);
        let mtd = DummyMtd::with_data(&initial);

        let result = dummy_device(&mtd).read(Path::new(DEV), 123, 123, 9).unwrap();

        assert_eq!(mtd.opened(), vec![(PathBuf::from(DEV), AccessMode::ReadOnly)]);
        assert_eq!(mtd.close_count(), 1);
        assert_eq!(result, b"test data");
    }

    #[test]
    fn test_read_bounded_by_size() {
        let mtd = DummyMtd::with_data(&[7u8; 64]);

        let result = dummy_device(&mtd).read(Path::new(DEV), 32, 16, 1000).unwrap();
        assert_eq!(result, vec![7u8; 32]);
    }

    #[test]
    fn test_read_stops_at_end_of_device() {
        let mtd = DummyMtd::with_data(&[7u8; 20]);

        let result = dummy_device(&mtd).read(Path::new(DEV), 64, 16, 64).unwrap();
        assert_eq!(result.len(), 20);
    }

    #[test]
    fn test_read_open_fails() {
        let mtd = DummyMtd::new(123);
        mtd.set_fail_open(true);

        let err = dummy_device(&mtd)
            .read(Path::new(DEV), 123, 123, 123)
            .unwrap_err();
        assert!(err.to_string().contains("Opening /dev/mtd0 failed"));
        assert!(err.os_error().is_some());
    }

    #[test]
    fn test_write_open_fails() {
        let mtd = DummyMtd::new(123);
        mtd.set_fail_open(true);

        let err = dummy_device(&mtd)
            .write(Path::new(DEV), 123, 123, &mut Cursor::new(b"test data"), 123)
            .unwrap_err();
        assert_eq!(err.to_string(), "Opening /dev/mtd0 failed");
        assert_eq!(err.code(), ErrorCode::Failed);
    }

    #[test]
    fn test_erase_failure_closes_handle() {
        let mtd = DummyMtd::with_data(&[0u8; 64]);
        mtd.set_fail_erase(true);

        let err = dummy_device(&mtd)
            .write(Path::new(DEV), 64, 16, &mut Cursor::new(vec![1u8; 64]), 64)
            .unwrap_err();

        assert!(err.to_string().contains("Erasing 16 bytes of /dev/mtd0 at offset 0x0 failed"));
        assert_eq!(mtd.program_count(), 0);
        assert_eq!(mtd.open_count(), 1);
        assert_eq!(mtd.close_count(), 1);
    }

    #[test]
    fn test_program_failure_aborts_remaining_blocks() {
        let mtd = DummyMtd::with_data(&[0u8; 64]);
        mtd.set_fail_program(true);

        let err = dummy_device(&mtd)
            .write(Path::new(DEV), 64, 16, &mut Cursor::new(vec![1u8; 64]), 64)
            .unwrap_err();

        assert!(err.to_string().contains("Writing 16 bytes to /dev/mtd0 at offset 0x0 failed"));
        assert_eq!(mtd.erase_count(), 1);
        assert_eq!(mtd.close_count(), 1);
    }

    #[test]
    fn test_write_rejects_oversized_image() {
        let mtd = DummyMtd::new(64);

        let err = dummy_device(&mtd)
            .write(Path::new(DEV), 64, 16, &mut Cursor::new(vec![1u8; 80]), 80)
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidFirmware);
        assert_eq!(mtd.open_count(), 0);
    }

    #[test]
    fn test_short_image_does_not_erase() {
        let mtd = DummyMtd::with_data(&[0u8; 64]);

        let err = dummy_device(&mtd)
            .write(Path::new(DEV), 64, 16, &mut Cursor::new(vec![1u8; 20]), 64)
            .unwrap_err();

        // First block programmed, second block untouched
        assert!(err.to_string().contains("Firmware image ended after 20 of 64 bytes"));
        assert_eq!(mtd.erases(), vec![(0, 16)]);
        assert_eq!(mtd.close_count(), 1);
        assert!(mtd.data()[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        let mtd = DummyMtd::new(64);
        let device = dummy_device(&mtd);

        assert!(device.read(Path::new(DEV), 64, 0, 64).is_err());
        assert!(device
            .write(Path::new(DEV), 8, 16, &mut Cursor::new(vec![0u8; 8]), 8)
            .is_err());
        assert_eq!(mtd.open_count(), 0);
    }

    #[test]
    fn test_is_erased() {
        assert!(is_erased(&[0xFF; 8]));
        assert!(!is_erased(&[0xFF, 0xFF, 0xFE]));
        assert!(is_erased(&[]));
    }
}
