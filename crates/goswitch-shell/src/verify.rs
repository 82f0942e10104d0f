use crate::config::{ConfigError, ShellConfig};
use crate::detect::ShellType;
use goswitch_platform::background_command;
use log::debug;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    Configured,
    NotConfigured,
    ConfigFileNotFound,
    /// A fresh shell already sees the active SDK, set up by something other
    /// than goswitch's profile line.
    FunctionalButNotInConfig,
    Error(String),
}

/// Check whether `shell_type` loads goswitch at startup: first by looking
/// for `marker` in its profile, then by asking a fresh shell for `GOROOT`.
pub async fn verify_shell_config(
    shell_type: ShellType,
    marker: &str,
    expected_goroot: &Path,
) -> VerificationResult {
    let Some(config_path) = get_config_path_for_shell(shell_type) else {
        return VerificationResult::ConfigFileNotFound;
    };

    match ShellConfig::load(shell_type, config_path) {
        Ok(config) if config.has_init(marker) => VerificationResult::Configured,
        Ok(_) => {
            if functional_test(shell_type, expected_goroot).await {
                VerificationResult::FunctionalButNotInConfig
            } else {
                VerificationResult::NotConfigured
            }
        }
        Err(error) => VerificationResult::Error(error.to_string()),
    }
}

async fn functional_test(shell_type: ShellType, expected_goroot: &Path) -> bool {
    let Some(program) = shell_type
        .binaries()
        .iter()
        .find(|binary| which::which(binary).is_ok())
    else {
        return false;
    };

    let args: &[&str] = match shell_type {
        ShellType::Bash | ShellType::Zsh => &["-i", "-c", "printf '%s' \"$GOROOT\""],
        ShellType::Fish => &["-c", "printf '%s' $GOROOT"],
        ShellType::PowerShell => &["-NoLogo", "-Command", "Write-Output $env:GOROOT"],
    };

    let output = match background_command(program).args(args).output().await {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            debug!("{shell_type} probe exited with {}", output.status);
            return false;
        }
        Err(error) => {
            debug!("{shell_type} probe failed to start: {error}");
            return false;
        }
    };

    let reported = String::from_utf8_lossy(&output.stdout);
    let reported = reported.trim();
    debug!("{shell_type} reports GOROOT={reported}");
    !reported.is_empty() && Path::new(reported) == expected_goroot
}

/// The first existing profile for `shell_type`.
pub fn get_config_path_for_shell(shell_type: ShellType) -> Option<PathBuf> {
    shell_type.config_files().into_iter().find(|p| p.exists())
}

/// The existing profile for `shell_type`, or the preferred place to create
/// one.
pub fn get_or_create_config_path(shell_type: ShellType) -> Result<PathBuf, ConfigError> {
    if let Some(existing) = get_config_path_for_shell(shell_type) {
        return Ok(existing);
    }

    shell_type
        .config_files()
        .into_iter()
        .next()
        .ok_or(ConfigError::NoProfile(shell_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn functional_test_rejects_unrelated_goroot() {
        let bogus = Path::new("/definitely/not/a/goswitch/root");
        assert!(!functional_test(ShellType::Bash, bogus).await);
    }

    #[test]
    fn create_path_falls_back_to_first_candidate() {
        if dirs::home_dir().is_none() {
            return;
        }
        let path = get_or_create_config_path(ShellType::Fish).expect("fish profile path");
        assert!(path.ends_with("conf.d/goswitch.fish"));
    }
}
