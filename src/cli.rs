//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use fwupdate_firmware::{EnvAssignment, FW_SETENV};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fwupdate")]
#[command(author, version, about = "Raw MTD firmware updater", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Sysfs directory with one mtdN entry per partition
    #[arg(long, global = true, default_value = fwupdate_mtd::MTD_SYSFS_ROOT)]
    pub sysfs_root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Firmware partitions the updater knows about
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Target {
    /// Bootloader image
    Bootloader,
    /// Boot environment
    Env,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show MTD partition geometry
    Info {
        /// MTD partition index
        #[arg(short = 'n', long)]
        partition: u32,
    },

    /// Dump a firmware partition to a file
    Read {
        /// Partition to read
        #[arg(value_enum)]
        target: Target,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Override the MTD partition index
        #[arg(long)]
        partition: Option<u32>,
    },

    /// Write firmware to flash
    #[command(subcommand)]
    Write(WriteCommands),
}

/// Write subcommands, one per firmware target
#[derive(Subcommand)]
pub enum WriteCommands {
    /// Program a bootloader image
    Bootloader {
        /// Input image path
        #[arg(short, long)]
        input: PathBuf,

        /// Override the MTD partition index
        #[arg(long)]
        partition: Option<u32>,

        /// Read the partition back and compare after writing
        #[arg(long)]
        verify: bool,
    },

    /// Update the boot environment from a binary image or a script
    Env {
        /// Binary environment image, or assignment script with --script
        #[arg(short, long)]
        input: PathBuf,

        /// Treat the input as an assignment script for the environment-set utility
        #[arg(long)]
        script: bool,

        /// Override the MTD partition index
        #[arg(long)]
        partition: Option<u32>,

        /// Variable to set after the update (repeatable)
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<EnvAssignment>,

        /// Environment-set utility
        #[arg(long, default_value = FW_SETENV)]
        fw_setenv: PathBuf,

        /// Configuration file passed to the utility with -c
        #[arg(long)]
        fw_env_config: Option<PathBuf>,

        /// Apply all assignments in a single script invocation
        #[arg(long)]
        batch: bool,
    },
}
