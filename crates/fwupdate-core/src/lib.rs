//! fwupdate-core - Shared types for the fwupdate crates
//!
//! Every fallible operation in the workspace returns [`UpgradeError`]. The
//! error carries a human readable message and an [`ErrorCode`] that the
//! front end turns into a process exit status.

pub mod error;

pub use error::{ErrorCode, Result, UpgradeError};
