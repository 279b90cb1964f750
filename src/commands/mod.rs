//! CLI command implementations
//!
//! Each command resolves its partition through `fwupdate-mtd` and, for
//! writes, drives one of the `fwupdate-firmware` targets.

pub mod info;
pub mod read;
pub mod write;

/// Human readable byte count
pub(crate) fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
