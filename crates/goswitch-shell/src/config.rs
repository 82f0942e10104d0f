use crate::detect::ShellType;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No profile location known for {0}")]
    NoProfile(ShellType),
}

pub struct ShellConfig {
    pub shell_type: ShellType,
    pub config_path: PathBuf,
    pub content: String,
}

impl ShellConfig {
    pub fn load(shell_type: ShellType, config_path: PathBuf) -> Result<Self, ConfigError> {
        let content = if config_path.exists() {
            fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
                action: "read",
                path: config_path.clone(),
                source,
            })?
        } else {
            String::new()
        };

        Ok(Self {
            shell_type,
            config_path,
            content,
        })
    }

    #[must_use]
    pub fn has_init(&self, marker: &str) -> bool {
        self.content.lines().any(|line| is_init_line(line, marker))
    }

    /// Append `init_command` under a `# {label}` comment unless a line with
    /// `marker` is already present.
    #[must_use]
    pub fn add_init(&self, init_command: &str, marker: &str, label: &str) -> ShellConfigEdit {
        if self.has_init(marker) {
            return ShellConfigEdit::unchanged(&self.content);
        }

        let mut modified = self.content.clone();
        if !modified.is_empty() && !modified.ends_with('\n') {
            modified.push('\n');
        }
        if !modified.is_empty() {
            modified.push('\n');
        }
        let _ = writeln!(modified, "# {label}");
        let _ = writeln!(modified, "{init_command}");

        ShellConfigEdit {
            original: self.content.clone(),
            modified,
            changes: vec![format!("Add initialization: {init_command}")],
        }
    }

    /// Drop every init line containing `marker`, with the `# {label}`
    /// comment directly above it.
    #[must_use]
    pub fn remove_init(&self, marker: &str, label: &str) -> ShellConfigEdit {
        if !self.has_init(marker) {
            return ShellConfigEdit::unchanged(&self.content);
        }

        let label_line = format!("# {label}");
        let mut kept: Vec<&str> = Vec::new();
        let mut changes = Vec::new();
        for line in self.content.lines() {
            if is_init_line(line, marker) {
                if kept.last().is_some_and(|prev| prev.trim() == label_line) {
                    kept.pop();
                }
                // blank separator written by add_init
                if kept.last().is_some_and(|prev| prev.trim().is_empty()) {
                    kept.pop();
                }
                changes.push(format!("Remove initialization: {}", line.trim()));
            } else {
                kept.push(line);
            }
        }

        let mut modified = kept.join("\n");
        if !modified.is_empty() && self.content.ends_with('\n') {
            modified.push('\n');
        }

        ShellConfigEdit {
            original: self.content.clone(),
            modified,
            changes,
        }
    }

    pub fn apply_edit(&mut self, edit: &ShellConfigEdit) -> Result<(), ConfigError> {
        if !edit.has_changes() {
            return Ok(());
        }

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                action: "create directory for",
                path: self.config_path.clone(),
                source,
            })?;
        }

        fs::write(&self.config_path, &edit.modified).map_err(|source| ConfigError::Io {
            action: "write",
            path: self.config_path.clone(),
            source,
        })?;
        self.content.clone_from(&edit.modified);

        Ok(())
    }
}

fn is_init_line(line: &str, marker: &str) -> bool {
    let trimmed = line.trim_start();
    !trimmed.starts_with('#') && trimmed.contains(marker)
}

pub struct ShellConfigEdit {
    pub original: String,
    pub modified: String,
    pub changes: Vec<String>,
}

impl ShellConfigEdit {
    fn unchanged(content: &str) -> Self {
        Self {
            original: content.to_string(),
            modified: content.to_string(),
            changes: Vec::new(),
        }
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    #[must_use]
    pub fn diff_preview(&self) -> String {
        if !self.has_changes() {
            return "No changes needed.".to_string();
        }

        let mut preview = String::new();

        for change in &self.changes {
            let _ = writeln!(preview, "+ {change}");
        }

        preview
    }
}
