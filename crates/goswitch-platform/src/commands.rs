use std::ffi::OsStr;
use std::process::Stdio;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// A child process that runs unattended: no console window on Windows, no
/// inherited stdin, output captured, killed if the handle is dropped.
pub fn background_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut command = tokio::process::Command::new(program);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(windows)]
    command.creation_flags(CREATE_NO_WINDOW);
    command
}

#[cfg(test)]
mod tests {
    use super::background_command;

    #[cfg(unix)]
    #[tokio::test]
    async fn background_command_captures_stdout() {
        let output = background_command("sh")
            .args(["-c", "printf ready"])
            .output()
            .await
            .expect("sh should run");

        assert!(output.status.success());
        assert_eq!(output.stdout, b"ready");
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let result = background_command("goswitch-definitely-missing-binary")
            .output()
            .await;

        assert!(result.is_err());
    }
}
