use std::fmt::Write as _;
use std::path::Path;

use crate::detect::ShellType;

/// Text that identifies goswitch's line in a shell profile.
pub const INIT_MARKER: &str = "goswitch env";

/// Comment written above the init line.
pub const INIT_LABEL: &str = "goswitch (Go SDK manager)";

/// The profile line that loads the environment snippet at shell startup.
#[must_use]
pub fn init_command(shell: ShellType) -> String {
    match shell {
        ShellType::Bash | ShellType::Zsh => {
            format!("eval \"$({INIT_MARKER} --shell {})\"", shell.name())
        }
        ShellType::Fish => format!("{INIT_MARKER} --shell fish | source"),
        ShellType::PowerShell => {
            format!("{INIT_MARKER} --shell powershell | Out-String | Invoke-Expression")
        }
    }
}

/// Shell code that sets `GOROOT` to `goroot` and prepends its `bin`
/// directory to `PATH`.
#[must_use]
pub fn render_env(shell: ShellType, goroot: &Path) -> String {
    let goroot = goroot.to_string_lossy();
    let mut out = String::new();
    match shell {
        ShellType::Bash | ShellType::Zsh => {
            let _ = writeln!(out, "export GOROOT={}", posix_quote(&goroot));
            let _ = writeln!(out, "export PATH=\"$GOROOT/bin:$PATH\"");
        }
        ShellType::Fish => {
            let _ = writeln!(out, "set -gx GOROOT {}", fish_quote(&goroot));
            let _ = writeln!(out, "set -gx PATH \"$GOROOT/bin\" $PATH");
        }
        ShellType::PowerShell => {
            let _ = writeln!(out, "$env:GOROOT = {}", powershell_quote(&goroot));
            let _ = writeln!(
                out,
                "$env:PATH = (Join-Path $env:GOROOT 'bin') + [IO.Path]::PathSeparator + $env:PATH"
            );
        }
    }
    out
}

fn posix_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn fish_quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', r"\\").replace('\'', r"\'"))
}

fn powershell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_snippet_exports_goroot_and_path() {
        let snippet = render_env(ShellType::Bash, Path::new("/home/gopher/.goswitch/current"));

        assert_eq!(
            snippet,
            "export GOROOT='/home/gopher/.goswitch/current'\nexport PATH=\"$GOROOT/bin:$PATH\"\n"
        );
    }

    #[test]
    fn posix_quoting_survives_single_quotes() {
        let snippet = render_env(ShellType::Zsh, Path::new("/tmp/it's here"));
        assert!(snippet.starts_with(r"export GOROOT='/tmp/it'\''s here'"));
    }

    #[test]
    fn fish_snippet_uses_set_gx() {
        let snippet = render_env(ShellType::Fish, Path::new("/root/.goswitch/current"));
        assert!(snippet.contains("set -gx GOROOT '/root/.goswitch/current'"));
        assert!(snippet.contains("set -gx PATH \"$GOROOT/bin\" $PATH"));
    }

    #[test]
    fn powershell_doubles_single_quotes() {
        let snippet = render_env(ShellType::PowerShell, Path::new("C:/Users/o'neil/go"));
        assert!(snippet.starts_with("$env:GOROOT = 'C:/Users/o''neil/go'"));
    }

    #[test]
    fn init_commands_contain_marker() {
        for shell in ShellType::ALL {
            let command = init_command(shell);
            assert!(command.contains(INIT_MARKER), "{command}");
            assert!(command.contains(shell.name()), "{command}");
        }
    }
}
