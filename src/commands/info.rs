//! Partition info command

use super::format_size;
use fwupdate_core::Result;
use fwupdate_mtd::{MtdConfig, MtdDevice};

/// Print the geometry of one MTD partition
pub fn run_info(config: MtdConfig, partition: u32) -> Result<()> {
    let info = MtdDevice::with_config(config).get_partition_info(partition)?;

    println!("MTD Partition Information");
    println!("=========================");
    println!();
    println!("Index:           {}", partition);
    println!("Name:            {}", info.name);
    println!("Device:          {}", info.device_path.display());
    println!(
        "Size:            {} bytes ({})",
        info.size,
        format_size(info.size)
    );
    println!(
        "Erase size:      {} bytes ({})",
        info.erase_size,
        format_size(info.erase_size)
    );
    println!("Erase blocks:    {}", info.size / info.erase_size);

    Ok(())
}
