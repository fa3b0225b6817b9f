//! CLI response formatting and output.
//!
//! Provides the JSON envelope, text printing, and exit code mapping.

use redeploy::error::Hint;
use redeploy::{Error, ErrorCode, Result};
use serde::Serialize;

use super::TextReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Json,
    Text,
}

#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<Hint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl<T: Serialize> CliResponse<T> {
    /// Envelope carrying data for a run that finished with a failing exit code.
    pub fn with_exit_code(data: T, exit_code: i32) -> Self {
        Self {
            success: exit_code == 0,
            data: Some(data),
            error: None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize response".to_string()))
        })
    }
}

impl CliResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(CliError {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                details: err.details.clone(),
                hints: if err.hints.is_empty() {
                    None
                } else {
                    Some(err.hints.clone())
                },
                retryable: err.retryable,
            }),
        }
    }
}

fn write_stdout(payload: &str) -> Result<()> {
    use std::io::{self, Write};

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", payload) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            return Ok(()); // Exit gracefully on SIGPIPE
        }
        return Err(Error::internal_io(
            e.to_string(),
            Some("write stdout".to_string()),
        ));
    }
    Ok(())
}

fn print_response<T: Serialize>(response: &CliResponse<T>) -> Result<()> {
    write_stdout(&response.to_json()?)
}

pub fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigNotFound
        | ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigParseFailed
        | ErrorCode::ConfigInvalidValue => 2,

        ErrorCode::SshIdentityFileNotFound | ErrorCode::SshConnectFailed => 10,

        ErrorCode::RemoteCommandFailed | ErrorCode::RemoteCommandTimeout => 20,

        ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}

fn render_error_text(err: &Error) -> String {
    let mut text = format!("Error [{}]: {}", err.code.as_str(), err.message);
    if let Some(detail) = err.detail_error() {
        text.push_str(&format!("\n  {}", detail));
    } else if let Some(obj) = err.details.as_object() {
        for (key, value) in obj {
            let rendered = value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            text.push_str(&format!("\n  {}: {}", key, rendered));
        }
    }
    for hint in &err.hints {
        text.push_str(&format!("\n  hint: {}", hint.message));
    }
    text
}

/// Print a command result in the requested mode and return the process exit code.
pub fn emit<T: Serialize + TextReport>(result: Result<(T, i32)>, mode: ResponseMode) -> i32 {
    let (printed, exit_code) = match (result, mode) {
        (Ok((data, exit_code)), ResponseMode::Json) => (
            print_response(&CliResponse::with_exit_code(data, exit_code)),
            exit_code,
        ),
        (Ok((data, exit_code)), ResponseMode::Text) => {
            (write_stdout(data.to_text().trim_end()), exit_code)
        }
        (Err(err), ResponseMode::Json) => (
            print_response(&CliResponse::<()>::from_error(&err)),
            exit_code_for_error(err.code),
        ),
        (Err(err), ResponseMode::Text) => {
            eprintln!("{}", render_error_text(&err));
            (Ok(()), exit_code_for_error(err.code))
        }
    };

    match printed {
        Ok(()) => exit_code,
        Err(err) => {
            eprintln!("{}", render_error_text(&err));
            exit_code_for_error(err.code)
        }
    }
}
