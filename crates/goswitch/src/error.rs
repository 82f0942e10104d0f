use goswitch_backend::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    #[error(transparent)]
    Shell(#[from] goswitch_shell::ConfigError),

    #[error("No Go version is active yet; run `goswitch use <version>` first")]
    NoActiveVersion,

    #[error("Could not detect your shell; pass --shell")]
    UnknownShell,
}

impl AppError {
    pub fn timeout(operation: &'static str, seconds: u64) -> Self {
        Self::Timeout { operation, seconds }
    }
}

/// What the facade hands back for mutating operations: `"Success"` or
/// `"Error: <message>"`.
pub fn result_string<T>(result: &Result<T, AppError>) -> String {
    match result {
        Ok(_) => SUCCESS.to_string(),
        Err(error) => format!("Error: {error}"),
    }
}

pub const SUCCESS: &str = "Success";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_string_formats_success_and_errors() {
        let ok: Result<(), AppError> = Ok(());
        let busy: Result<(), AppError> = Err(BackendError::Busy {
            version: "1.22.0".to_string(),
        }
        .into());

        assert_eq!(result_string(&ok), "Success");
        assert_eq!(
            result_string(&busy),
            "Error: Another install is already in progress (1.22.0)"
        );
    }

    #[test]
    fn timeout_display_names_operation() {
        assert_eq!(
            AppError::timeout("Installation", 1800).to_string(),
            "Installation timed out after 1800s"
        );
    }

    #[test]
    fn engine_errors_keep_their_message() {
        let not_found = AppError::from(BackendError::not_found("Release", "9.9.9"));
        assert_eq!(not_found.to_string(), "Release not found: 9.9.9");
    }
}
