mod response;

pub use response::{emit, exit_code_for_error, ResponseMode};

/// Operator-facing plain text form of a command's output.
pub trait TextReport {
    fn to_text(&self) -> String;
}
