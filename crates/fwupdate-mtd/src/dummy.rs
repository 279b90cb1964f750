//! In-memory MTD emulator for testing
//!
//! Emulates a single raw flash partition: erased bytes read as `0xFF`,
//! programming can only clear bits, and erase restores whole ranges to
//! `0xFF`. Every operation is counted and open/erase/program failures can
//! be injected, so tests can check exactly which hardware operations a
//! write issued and that every handle got closed.
//!
//! Clones of a [`DummyMtd`] share the same flash contents and counters.

use crate::io::{AccessMode, MtdHandle, MtdIo};
use std::cell::RefCell;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

const ERASED: u8 = 0xFF;

#[derive(Debug, Default)]
struct DummyState {
    data: Vec<u8>,
    opened: Vec<(PathBuf, AccessMode)>,
    erases: Vec<(u32, u32)>,
    reads: usize,
    programs: usize,
    seeks: usize,
    closes: usize,
    fail_open: bool,
    fail_erase: bool,
    fail_program: bool,
}

/// Emulated MTD backend
#[derive(Debug, Clone, Default)]
pub struct DummyMtd {
    state: Rc<RefCell<DummyState>>,
}

impl DummyMtd {
    /// Create a blank (fully erased) device of `size` bytes
    pub fn new(size: usize) -> Self {
        Self::with_data(&vec![ERASED; size])
    }

    /// Create a device with the given contents
    pub fn with_data(data: &[u8]) -> Self {
        let state = DummyState {
            data: data.to_vec(),
            ..Default::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Current flash contents
    pub fn data(&self) -> Vec<u8> {
        self.state.borrow().data.clone()
    }

    /// Make the next opens fail
    pub fn set_fail_open(&self, fail: bool) {
        self.state.borrow_mut().fail_open = fail;
    }

    /// Make erase operations fail
    pub fn set_fail_erase(&self, fail: bool) {
        self.state.borrow_mut().fail_erase = fail;
    }

    /// Make program (write) operations fail
    pub fn set_fail_program(&self, fail: bool) {
        self.state.borrow_mut().fail_program = fail;
    }

    /// Paths and modes of all successful opens
    pub fn opened(&self) -> Vec<(PathBuf, AccessMode)> {
        self.state.borrow().opened.clone()
    }

    /// Number of successful opens
    pub fn open_count(&self) -> usize {
        self.state.borrow().opened.len()
    }

    /// Number of handles dropped
    pub fn close_count(&self) -> usize {
        self.state.borrow().closes
    }

    /// `(start, length)` of every successful erase
    pub fn erases(&self) -> Vec<(u32, u32)> {
        self.state.borrow().erases.clone()
    }

    /// Number of successful erases
    pub fn erase_count(&self) -> usize {
        self.state.borrow().erases.len()
    }

    /// Number of program (write) calls
    pub fn program_count(&self) -> usize {
        self.state.borrow().programs
    }

    /// Number of read calls
    pub fn read_count(&self) -> usize {
        self.state.borrow().reads
    }

    /// Number of seek calls
    pub fn seek_count(&self) -> usize {
        self.state.borrow().seeks
    }
}

impl MtdIo for DummyMtd {
    type Handle = DummyHandle;

    fn open(&self, path: &Path, mode: AccessMode) -> io::Result<DummyHandle> {
        let mut state = self.state.borrow_mut();
        if state.fail_open {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no such device", path.display()),
            ));
        }
        state.opened.push((path.to_path_buf(), mode));

        Ok(DummyHandle {
            state: Rc::clone(&self.state),
            pos: 0,
            mode,
        })
    }
}

/// Open handle on a [`DummyMtd`]
#[derive(Debug)]
pub struct DummyHandle {
    state: Rc<RefCell<DummyState>>,
    pos: u64,
    mode: AccessMode,
}

impl Read for DummyHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        state.reads += 1;

        let start = (self.pos as usize).min(state.data.len());
        let len = buf.len().min(state.data.len() - start);
        buf[..len].copy_from_slice(&state.data[start..start + len]);
        self.pos += len as u64;
        Ok(len)
    }
}

impl Write for DummyHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.mode == AccessMode::ReadOnly {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "device opened read-only",
            ));
        }

        let mut state = self.state.borrow_mut();
        if state.fail_program {
            return Err(io::Error::other("program failed"));
        }

        let start = self.pos as usize;
        if start + buf.len() > state.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "write beyond end of device",
            ));
        }

        // Flash programming: can only change 1 -> 0
        for (byte, &value) in state.data[start..start + buf.len()].iter_mut().zip(buf) {
            *byte &= value;
        }
        state.programs += 1;
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for DummyHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let mut state = self.state.borrow_mut();
        state.seeks += 1;

        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => (state.data.len() as u64).checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative offset")
        })?;
        self.pos = target;
        Ok(target)
    }
}

impl MtdHandle for DummyHandle {
    fn erase(&mut self, start: u32, length: u32) -> io::Result<()> {
        if self.mode == AccessMode::ReadOnly {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "device opened read-only",
            ));
        }

        let mut state = self.state.borrow_mut();
        if state.fail_erase {
            return Err(io::Error::other("erase failed"));
        }

        let (begin, end) = (start as usize, start as usize + length as usize);
        if end > state.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "erase beyond end of device",
            ));
        }

        state.data[begin..end].fill(ERASED);
        state.erases.push((start, length));
        Ok(())
    }
}

impl Drop for DummyHandle {
    fn drop(&mut self) {
        self.state.borrow_mut().closes += 1;
    }
}

/// Create `<root>/mtd<index>/{size,erasesize,name}` like the kernel does
pub fn populate_sysfs(
    root: &Path,
    index: u32,
    size: &str,
    erase_size: &str,
    name: &str,
) -> io::Result<()> {
    let dir = root.join(format!("mtd{}", index));
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("size"), format!("{}\n", size))?;
    fs::write(dir.join("erasesize"), format!("{}\n", erase_size))?;
    fs::write(dir.join("name"), format!("{}\n", name))?;
    Ok(())
}
