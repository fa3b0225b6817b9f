use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigNotFound,
    ConfigMissingKey,
    ConfigParseFailed,
    ConfigInvalidValue,

    SshIdentityFileNotFound,
    SshConnectFailed,

    RemoteCommandFailed,
    RemoteCommandTimeout,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigNotFound => "config.not_found",
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigParseFailed => "config.parse_failed",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::SshIdentityFileNotFound => "ssh.identity_file_not_found",
            ErrorCode::SshConnectFailed => "ssh.connect_failed",

            ErrorCode::RemoteCommandFailed => "remote.command_failed",
            ErrorCode::RemoteCommandTimeout => "remote.command_timeout",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigNotFoundDetails {
    pub searched: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigParseFailedDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshIdentityFileNotFoundDetails {
    pub identity_file: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshConnectFailedDetails {
    pub transport: String,
    pub error: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn config_not_found(searched: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ConfigNotFound,
            "No deployment configuration found",
            to_details(ConfigNotFoundDetails { searched }),
        )
        .with_hint("Pass --config <path> or set REDEPLOY_CONFIG")
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        Self::new(
            ErrorCode::ConfigMissingKey,
            "Missing required configuration key",
            to_details(ConfigMissingKeyDetails {
                key: key.into(),
                path,
            }),
        )
    }

    pub fn config_parse_failed(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ConfigParseFailed,
            "Could not parse configuration file",
            to_details(ConfigParseFailedDetails {
                path: path.into(),
                error: error.into(),
            }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            to_details(ConfigInvalidValueDetails {
                key: key.into(),
                value,
                problem: problem.into(),
            }),
        )
    }

    pub fn ssh_identity_file_not_found(identity_file: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::SshIdentityFileNotFound,
            "SSH identity file not found",
            to_details(SshIdentityFileNotFoundDetails {
                identity_file: identity_file.into(),
            }),
        )
    }

    pub fn ssh_connect_failed(
        transport: impl Into<String>,
        error: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        let mut err = Self::new(
            ErrorCode::SshConnectFailed,
            "Could not connect to deployment target",
            to_details(SshConnectFailedDetails {
                transport: transport.into(),
                error: error.into(),
                output: output.into(),
            }),
        );
        err.retryable = Some(false);
        err
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            to_details(InternalIoErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            to_details(InternalJsonErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// The `error` string carried in the details payload, if any.
    pub fn detail_error(&self) -> Option<&str> {
        self.details.get("error").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_failed_is_not_retryable() {
        let err = Error::ssh_connect_failed("ssh deploy@host", "Permission denied", "");
        assert_eq!(err.code, ErrorCode::SshConnectFailed);
        assert_eq!(err.retryable, Some(false));
        assert_eq!(err.detail_error(), Some("Permission denied"));
        assert!(err.details.get("output").is_none());
    }

    #[test]
    fn config_not_found_lists_searched_paths() {
        let err = Error::config_not_found(vec!["./redeploy.json".to_string()]);
        assert_eq!(err.code.as_str(), "config.not_found");
        assert_eq!(err.details["searched"][0], "./redeploy.json");
        assert_eq!(err.hints.len(), 1);
    }
}
