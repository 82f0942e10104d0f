//! Shell integration: the `env` snippet and profile setup.

use std::path::{Path, PathBuf};

use log::info;

use goswitch_backend::InstallStore;
use goswitch_shell::{
    INIT_LABEL, INIT_MARKER, ShellConfig, ShellConfigEdit, ShellType, VerificationResult,
    get_or_create_config_path, init_command, render_env, verify_shell_config,
};

use crate::error::AppError;

use super::App;

impl App {
    /// What `GOROOT` should be in new shells. On Unix this is the pointer
    /// symlink itself, so later switches apply without re-sourcing.
    pub fn env_goroot(&self) -> Result<PathBuf, AppError> {
        if cfg!(windows) {
            self.store
                .read_active_pointer()?
                .ok_or(AppError::NoActiveVersion)
        } else {
            Ok(self.store.pointer_path())
        }
    }

    pub fn env_snippet(&self, shell: ShellType) -> Result<String, AppError> {
        Ok(render_env(shell, &self.env_goroot()?))
    }

    /// Add (or with `remove`, drop) the init line in `shell`'s profile.
    pub fn setup_shell(&self, shell: ShellType, remove: bool) -> Result<ShellConfigEdit, AppError> {
        let path = get_or_create_config_path(shell)?;
        self.setup_shell_at(shell, &path, remove)
    }

    pub(super) fn setup_shell_at(
        &self,
        shell: ShellType,
        profile: &Path,
        remove: bool,
    ) -> Result<ShellConfigEdit, AppError> {
        let mut config = ShellConfig::load(shell, profile.to_path_buf())?;
        let edit = if remove {
            config.remove_init(INIT_MARKER, INIT_LABEL)
        } else {
            config.add_init(&init_command(shell), INIT_MARKER, INIT_LABEL)
        };

        if edit.has_changes() {
            config.apply_edit(&edit)?;
            info!("Updated {} profile {}", shell, profile.display());
        }
        Ok(edit)
    }

    pub async fn verify_shell(&self, shell: ShellType) -> Result<VerificationResult, AppError> {
        let goroot = self.env_goroot()?;
        Ok(verify_shell_config(shell, INIT_MARKER, &goroot).await)
    }
}
