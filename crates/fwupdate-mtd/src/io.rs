//! Device node access
//!
//! [`MtdIo`] is the seam between [`MtdDevice`](crate::MtdDevice) and the
//! platform. The Linux backend opens `/dev/mtdN` with `O_SYNC` and erases
//! through the `MEMERASE` ioctl; tests use the in-memory emulator from the
//! `dummy` module instead.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

/// How a device node is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-only, used by `read()`
    ReadOnly,
    /// Read-write, used by `write()`
    ReadWrite,
}

/// An open MTD device node
///
/// The handle is closed when dropped.
pub trait MtdHandle: Read + Write + Seek {
    /// Erase `length` bytes starting at `start`
    fn erase(&mut self, start: u32, length: u32) -> io::Result<()>;
}

/// Opens MTD device nodes
pub trait MtdIo {
    /// Handle type returned by [`MtdIo::open`]
    type Handle: MtdHandle;

    /// Open the device node at `path` synchronously
    fn open(&self, path: &Path, mode: AccessMode) -> io::Result<Self::Handle>;
}

mod ioctl {
    /// MEMERASE ioctl argument structure
    /// Matches struct erase_info_user from mtd/mtd-user.h
    #[repr(C)]
    pub struct EraseInfo {
        pub start: u32,
        pub length: u32,
    }

    // MEMERASE = _IOW('M', 2, struct erase_info_user)
    nix::ioctl_write_ptr!(memerase, b'M', 2, EraseInfo);
}

/// Linux `/dev/mtdN` backend
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxMtdIo;

impl MtdIo for LinuxMtdIo {
    type Handle = File;

    fn open(&self, path: &Path, mode: AccessMode) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(mode == AccessMode::ReadWrite)
            .custom_flags(libc::O_SYNC)
            .open(path)
    }
}

impl MtdHandle for File {
    fn erase(&mut self, start: u32, length: u32) -> io::Result<()> {
        let erase_info = ioctl::EraseInfo { start, length };

        // SAFETY: the descriptor is owned by `self` and stays open for the
        // duration of the call; erase_info is a valid, initialized struct.
        unsafe { ioctl::memerase(self.as_raw_fd(), &erase_info) }
            .map(|_| ())
            .map_err(io::Error::from)
    }
}
