use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported shell: {0} (expected bash, zsh, fish or powershell)")]
pub struct UnknownShell(pub String);

impl ShellType {
    pub const ALL: [Self; 4] = [Self::Bash, Self::Zsh, Self::Fish, Self::PowerShell];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
            Self::Fish => "fish",
            Self::PowerShell => "powershell",
        }
    }

    /// Executables that provide this shell, in order of preference.
    #[must_use]
    pub fn binaries(self) -> &'static [&'static str] {
        match self {
            Self::Bash => &["bash"],
            Self::Zsh => &["zsh"],
            Self::Fish => &["fish"],
            Self::PowerShell => &["pwsh", "powershell"],
        }
    }

    /// The shell the user is most likely running: `$SHELL` on Unix,
    /// PowerShell on Windows.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        if cfg!(windows) {
            return Some(Self::PowerShell);
        }
        let shell = std::env::var_os("SHELL")?;
        Self::from_program(Path::new(&shell))
    }

    /// Identify a shell from a program path such as `/usr/bin/zsh`.
    #[must_use]
    pub fn from_program(program: &Path) -> Option<Self> {
        let stem = program.file_stem()?.to_str()?;
        stem.parse().ok()
    }

    /// Profile files this shell reads at startup; the first one is created
    /// when none exist.
    #[must_use]
    pub fn config_files(self) -> Vec<PathBuf> {
        let Some(home) = dirs::home_dir() else {
            return Vec::new();
        };
        self.config_files_in(&home)
    }

    pub(crate) fn config_files_in(self, home: &Path) -> Vec<PathBuf> {
        match self {
            Self::Bash => {
                let mut files = vec![home.join(".bashrc")];
                // login shells on macOS skip .bashrc
                if cfg!(target_os = "macos") {
                    files.insert(0, home.join(".bash_profile"));
                }
                files
            }
            Self::Zsh => {
                let zdotdir = std::env::var_os("ZDOTDIR")
                    .filter(|value| !value.is_empty())
                    .map_or_else(|| home.to_path_buf(), PathBuf::from);
                vec![zdotdir.join(".zshrc")]
            }
            Self::Fish => vec![home.join(".config/fish/conf.d/goswitch.fish")],
            Self::PowerShell => {
                if cfg!(windows) {
                    let documents = dirs::document_dir().unwrap_or_else(|| home.join("Documents"));
                    vec![
                        documents.join("PowerShell/Microsoft.PowerShell_profile.ps1"),
                        documents.join("WindowsPowerShell/Microsoft.PowerShell_profile.ps1"),
                    ]
                } else {
                    vec![home.join(".config/powershell/Microsoft.PowerShell_profile.ps1")]
                }
            }
        }
    }

    #[must_use]
    pub fn is_installed(self) -> bool {
        self.binaries()
            .iter()
            .any(|binary| which::which(binary).is_ok())
    }
}

impl fmt::Display for ShellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShellType {
    type Err = UnknownShell;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bash" => Ok(Self::Bash),
            "zsh" => Ok(Self::Zsh),
            "fish" => Ok(Self::Fish),
            "powershell" | "pwsh" => Ok(Self::PowerShell),
            other => Err(UnknownShell(other.to_string())),
        }
    }
}

/// Shells found on `PATH`, the current one first.
#[must_use]
pub fn detect_shells() -> Vec<ShellType> {
    let current = ShellType::from_env();
    let mut shells: Vec<ShellType> = current.into_iter().collect();
    shells.extend(
        ShellType::ALL
            .into_iter()
            .filter(|shell| Some(*shell) != current && shell.is_installed()),
    );
    shells
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Bash".parse::<ShellType>(), Ok(ShellType::Bash));
        assert_eq!("pwsh".parse::<ShellType>(), Ok(ShellType::PowerShell));
        assert_eq!(
            "tcsh".parse::<ShellType>(),
            Err(UnknownShell("tcsh".to_string()))
        );
    }

    #[test]
    fn identifies_shell_from_program_path() {
        assert_eq!(
            ShellType::from_program(Path::new("/usr/bin/zsh")),
            Some(ShellType::Zsh)
        );
        assert_eq!(
            ShellType::from_program(Path::new("/opt/homebrew/bin/fish")),
            Some(ShellType::Fish)
        );
        assert_eq!(ShellType::from_program(Path::new("/bin/sh")), None);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for shell in ShellType::ALL {
            assert_eq!(shell.to_string().parse::<ShellType>(), Ok(shell));
        }
    }

    #[test]
    fn fish_uses_a_conf_d_snippet() {
        let home = Path::new("/home/gopher");
        assert_eq!(
            ShellType::Fish.config_files_in(home),
            [home.join(".config/fish/conf.d/goswitch.fish")]
        );
    }

    #[test]
    fn bashrc_is_always_a_candidate() {
        let home = Path::new("/home/gopher");
        assert!(
            ShellType::Bash
                .config_files_in(home)
                .contains(&home.join(".bashrc"))
        );
    }
}
