//! Boot environment assignments and the `fw_setenv` utility
//!
//! The environment partition uses a vendor specific on-flash encoding, so
//! structured updates go through `fw_setenv` instead of raw block writes.

use fwupdate_core::{ErrorCode, Result, UpgradeError};
use log::{debug, info};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;

/// Default environment-set utility
pub const FW_SETENV: &str = "fw_setenv";

/// One environment variable update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvAssignment {
    /// Variable name
    pub name: String,
    /// New value, `None` deletes the variable
    pub value: Option<String>,
}

impl EnvAssignment {
    /// Assign `value` to `name`
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// Delete `name`
    pub fn unset(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// Line in `fw_setenv --script` format
    fn script_line(&self) -> String {
        match &self.value {
            Some(value) => format!("{} {}", self.name, value),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for EnvAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for EnvAssignment {
    type Err = UpgradeError;

    /// Parse `name=value`, or a bare `name` to delete the variable
    fn from_str(s: &str) -> Result<Self> {
        let (name, value) = match s.split_once('=') {
            Some((name, "")) => (name, None),
            Some((name, value)) => (name, Some(value)),
            None => (s, None),
        };

        if !is_valid_name(name) {
            return Err(UpgradeError::with_code(
                format!("Invalid environment variable name '{}'", name),
                ErrorCode::InvalidInput,
            ));
        }

        Ok(Self {
            name: name.to_string(),
            value: value.map(str::to_string),
        })
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_graphic() && c != '=')
}

/// Parse an environment assignment script
///
/// Every line must be blank, a `#` comment, `name=value`, `name value` or a
/// bare `name`, which deletes the variable.
///
/// # Errors
/// Returns [`ErrorCode::InvalidFirmware`] if the payload is not UTF-8 text,
/// contains NUL bytes or has a malformed line.
pub fn parse_env_script(payload: &[u8]) -> Result<Vec<EnvAssignment>> {
    let text = std::str::from_utf8(payload)
        .ok()
        .filter(|text| !text.contains('\0'))
        .ok_or_else(|| {
            UpgradeError::with_code(
                "Environment script is not a text file",
                ErrorCode::InvalidFirmware,
            )
        })?;

    let mut assignments = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let assignment = parse_script_line(line).ok_or_else(|| {
            UpgradeError::with_code(
                format!("Invalid environment script line {}: '{}'", number + 1, line),
                ErrorCode::InvalidFirmware,
            )
        })?;
        assignments.push(assignment);
    }
    Ok(assignments)
}

/// Applies environment assignments to the persisted boot environment
pub trait EnvSetter {
    /// Apply all assignments, stopping at the first failure
    fn apply(&self, assignments: &[EnvAssignment]) -> Result<()>;
}

/// [`EnvSetter`] running the `fw_setenv` utility
#[derive(Debug, Clone)]
pub struct FwSetEnv {
    program: PathBuf,
    config: Option<PathBuf>,
    batch: bool,
}

impl Default for FwSetEnv {
    fn default() -> Self {
        Self {
            program: PathBuf::from(FW_SETENV),
            config: None,
            batch: false,
        }
    }
}

impl FwSetEnv {
    /// `fw_setenv` from `PATH`, one invocation per variable
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different program
    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Pass `-c <config>` to every invocation
    pub fn config(mut self, config: impl Into<PathBuf>) -> Self {
        self.config = Some(config.into());
        self
    }

    /// Apply all assignments in a single `-s -` invocation
    pub fn batch(mut self, batch: bool) -> Self {
        self.batch = batch;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(config) = &self.config {
            cmd.arg("-c").arg(config);
        }
        cmd.stdin(Stdio::null()).stdout(Stdio::null());
        cmd
    }

    fn spawn_failed(&self, err: std::io::Error) -> UpgradeError {
        UpgradeError::io(format!("Running {} failed", self.program.display()), err)
    }

    fn run_single(&self, assignment: &EnvAssignment) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg(&assignment.name);
        if let Some(value) = &assignment.value {
            cmd.arg(value);
        }

        debug!("Running {:?}", cmd);
        let status = cmd.status().map_err(|e| self.spawn_failed(e))?;
        if !status.success() {
            return Err(UpgradeError::new(format!(
                "Setting environment variable '{}' with {} failed ({})",
                assignment.name,
                self.program.display(),
                status
            )));
        }
        Ok(())
    }

    fn run_script(&self, assignments: &[EnvAssignment]) -> Result<()> {
        let mut script = String::new();
        for assignment in assignments {
            script.push_str(&assignment.script_line());
            script.push('\n');
        }

        let mut cmd = self.command();
        cmd.arg("-s").arg("-").stdin(Stdio::piped());

        debug!("Running {:?} with {} assignments", cmd, assignments.len());
        let mut child = cmd.spawn().map_err(|e| self.spawn_failed(e))?;

        // Close stdin before waiting so the utility sees end of script
        let fed = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(script.as_bytes()),
            None => Ok(()),
        };
        let status = child.wait().map_err(|e| self.spawn_failed(e))?;

        if !status.success() {
            return Err(UpgradeError::new(format!(
                "Applying environment script with {} failed ({})",
                self.program.display(),
                status
            )));
        }
        fed.map_err(|e| {
            UpgradeError::io(
                format!("Feeding environment script to {} failed", self.program.display()),
                e,
            )
        })
    }
}

impl EnvSetter for FwSetEnv {
    fn apply(&self, assignments: &[EnvAssignment]) -> Result<()> {
        if assignments.is_empty() {
            return Ok(());
        }

        if self.batch {
            self.run_script(assignments)?;
        } else {
            for assignment in assignments {
                self.run_single(assignment)?;
            }
        }

        info!(
            "Applied {} environment assignments with {}",
            assignments.len(),
            self.program.display()
        );
        Ok(())
    }
}
