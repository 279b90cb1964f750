//! fwupdate-mtd - Raw access to Linux MTD flash partitions
//!
//! This crate resolves MTD partition geometry from sysfs and programs
//! firmware images into `/dev/mtdN` nodes with the erase-before-program
//! protocol raw NOR/NAND flash requires.
//!
//! # Example
//!
//! ```ignore
//! use fwupdate_mtd::MtdDevice;
//! use std::fs::File;
//!
//! let mtd = MtdDevice::new();
//! let info = mtd.get_partition_info(0)?;
//!
//! let mut image = File::open("flash.bin")?;
//! let len = image.metadata()?.len();
//! let stats = mtd.write(&info.device_path, info.size, info.erase_size, &mut image, len)?;
//! println!("{} blocks erased", stats.blocks_erased);
//! ```
//!
//! # Device Discovery
//!
//! Partition geometry comes from the kernel:
//! ```bash
//! cat /sys/class/mtd/mtd0/name
//! cat /sys/class/mtd/mtd0/size
//! cat /sys/class/mtd/mtd0/erasesize
//! ```
//!
//! # Write protocol
//!
//! For every erase block an image spans, the block is read back first. A
//! block that already reads as all `0xFF` is programmed directly; any other
//! block is erased with `MEMERASE` before programming. Handles are opened
//! with `O_SYNC` and closed before the call returns, on every path.

pub mod device;
#[cfg(any(test, feature = "dummy"))]
pub mod dummy;
pub mod io;
mod sysfs;

// Re-exports
pub use device::{
    is_erased, MtdConfig, MtdDevice, PartitionInfo, WriteStats, DEV_ROOT, ERASED_VALUE,
    MTD_SYSFS_ROOT,
};
pub use io::{AccessMode, LinuxMtdIo, MtdHandle, MtdIo};
