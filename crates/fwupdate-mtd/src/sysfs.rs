//! MTD partition metadata from sysfs

use fwupdate_core::{Result, UpgradeError};
use log::trace;
use std::path::Path;

/// Read a string attribute and sanitize it
pub(crate) fn read_sysfs_string(dir: &Path, attribute: &str) -> Result<String> {
    let path = dir.join(attribute);
    let content = std::fs::read_to_string(&path).map_err(|e| {
        UpgradeError::io(
            format!("Failed to read sysfs attribute '{}'", path.display()),
            e,
        )
    })?;

    // Drop non-printable characters and the trailing newline
    let sanitized: String = content
        .chars()
        .take_while(|c| c.is_ascii_graphic() || *c == ' ')
        .collect();
    let value = sanitized.trim_end().to_string();
    trace!("{} = '{}'", path.display(), value);
    Ok(value)
}

/// Read an integer attribute (decimal or `0x` hex)
pub(crate) fn read_sysfs_int(dir: &Path, attribute: &str) -> Result<u64> {
    let value_str = read_sysfs_string(dir, attribute)?;

    let value = if let Some(hex) = value_str
        .strip_prefix("0x")
        .or_else(|| value_str.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)
    } else {
        value_str.parse::<u64>()
    };

    value.map_err(|_| {
        UpgradeError::new(format!(
            "Failed to parse sysfs attribute '{}': '{}'",
            dir.join(attribute).display(),
            value_str
        ))
    })
}
