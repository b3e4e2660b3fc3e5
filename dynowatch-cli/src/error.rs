//! CLI-specific error types and exit code mapping

use dynowatch_core::error::DynowatchError;
use dynowatch_watchdog::WatchdogError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Log retrieval failed; no remediation was attempted.
    #[error("Failed to retrieve logs: {0}")]
    Retrieval(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, stdin read, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from dynowatch-core.
    #[error("{0}")]
    Core(#[from] DynowatchError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                              |
    /// |------|--------------------------------------|
    /// | 0    | Success / no error detected          |
    /// | 1    | Command or remediation failure       |
    /// | 2    | Configuration error                  |
    /// | 3    | Log retrieval failure                |
    /// | 10   | IO error                             |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Retrieval(_) => 3,
            Self::Io(_) => 10,
            Self::Core(core) => match core {
                DynowatchError::Config(_) => 2,
                DynowatchError::Source(_) => 3,
                DynowatchError::Io(_) => 10,
                DynowatchError::Remediation(_) => 1,
            },
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

impl From<WatchdogError> for CliError {
    fn from(e: WatchdogError) -> Self {
        Self::Core(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynowatch_core::error::{ConfigError, RemediationError, SourceError};

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_retrieval_error() {
        let err = CliError::Retrieval("HTTP 401 Unauthorized".to_owned());
        assert_eq!(err.exit_code(), 3, "retrieval error should return exit code 3");
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout closed");
        let err = CliError::Io(io_err);
        assert_eq!(err.exit_code(), 10, "io error should return exit code 10");
    }

    #[test]
    fn test_exit_code_command_error() {
        let err = CliError::Command("1 remediation(s) failed".to_owned());
        assert_eq!(err.exit_code(), 1, "command error should return exit code 1");
    }

    #[test]
    fn test_exit_code_core_variants() {
        let config: CliError = DynowatchError::Config(ConfigError::ParseFailed {
            reason: "bad".to_owned(),
        })
        .into();
        assert_eq!(config.exit_code(), 2);

        let source: CliError =
            DynowatchError::Source(SourceError::Spawn("heroku: not found".to_owned())).into();
        assert_eq!(source.exit_code(), 3);

        let remediation: CliError = DynowatchError::Remediation(RemediationError::CommandFailed {
            command: "heroku ps:scale web=0".to_owned(),
            reason: "exit status 1".to_owned(),
        })
        .into();
        assert_eq!(remediation.exit_code(), 1);
    }

    #[test]
    fn test_from_watchdog_command_error() {
        let err: CliError = WatchdogError::Command {
            command: "heroku ps:scale web=1".to_owned(),
            reason: "timed out after 120s".to_owned(),
        }
        .into();
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("ps:scale web=1"));
    }

    #[test]
    fn test_from_watchdog_config_error() {
        let err: CliError = WatchdogError::Config {
            field: "app_name".to_owned(),
            reason: "invalid length 0 (must be 1-100)".to_owned(),
        }
        .into();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_retrieval_display_matches_operator_message() {
        let err = CliError::Retrieval("HTTP 503 Service Unavailable".to_owned());
        assert_eq!(
            err.to_string(),
            "Failed to retrieve logs: HTTP 503 Service Unavailable"
        );
    }
}
