mod commands;
mod paths;
mod target;

pub use commands::background_command;
pub use paths::{AppPaths, AppPathsError};
pub use target::{ArchiveKind, Target, executable_name};
