//! fwupdate - In-place firmware updates on raw MTD flash partitions
//!
//! Thin front end over `fwupdate-firmware`: it picks a firmware target,
//! hands it the input stream and maps the outcome to an exit status.
//! Bundle extraction, board detection and user confirmation are left to
//! the caller.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, WriteCommands};
use fwupdate_core::UpgradeError;
use fwupdate_firmware::{EnvFormat, FwSetEnv};
use fwupdate_mtd::MtdConfig;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set log level based on verbosity
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = MtdConfig::default().sysfs_root(&cli.sysfs_root);

    let result = match cli.command {
        Commands::Info { partition } => commands::info::run_info(config, partition),
        Commands::Read {
            target,
            output,
            partition,
        } => commands::read::run_read(config, target, partition, &output),
        Commands::Write(WriteCommands::Bootloader {
            input,
            partition,
            verify,
        }) => commands::write::run_write_bootloader(config, &input, partition, verify),
        Commands::Write(WriteCommands::Env {
            input,
            partition,
            set,
            fw_setenv,
            script,
            fw_env_config,
            batch,
        }) => {
            let mut setter = FwSetEnv::new().program(fw_setenv).batch(batch);
            if let Some(path) = fw_env_config {
                setter = setter.config(path);
            }
            let format = if script {
                EnvFormat::Script
            } else {
                EnvFormat::Image
            };
            commands::write::run_write_env(config, &input, partition, format, setter, set)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::from(e.code().value())
        }
    }
}

fn report(err: &UpgradeError) {
    log::debug!("Failing with code {} ({})", err.code().value(), err.code());
    match err.os_error() {
        Some(cause) => eprintln!("Error: {}: {}", err, cause),
        None => eprintln!("Error: {}", err),
    }
}
