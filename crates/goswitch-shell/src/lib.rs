#![allow(clippy::missing_errors_doc)]

//! Makes the active Go SDK visible to interactive shells.
//!
//! `goswitch env` prints a snippet that points `GOROOT` at the active pointer
//! and puts its `bin` directory on `PATH`; profiles `eval` that output at
//! startup. Because the pointer on Unix is a symlink, a switch is picked up
//! by new commands without re-sourcing anything.

mod config;
mod detect;
mod env;
mod verify;

pub use config::{ConfigError, ShellConfig, ShellConfigEdit};
pub use detect::{ShellType, UnknownShell, detect_shells};
pub use env::{INIT_LABEL, INIT_MARKER, init_command, render_env};
pub use verify::{VerificationResult, get_or_create_config_path, verify_shell_config};
