//! Shell escaping and command composition utilities.

/// Escape a value for use inside single quotes.
/// Replaces `'` with `'\''` (end quote, escaped quote, start quote).
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// Quote a path for shell execution (always quotes).
pub fn quote_path(path: &str) -> String {
    format!("'{}'", escape_single_quote_content(path))
}

/// Escape an entire command string for sh -c execution.
/// Wraps entire command in single quotes and escapes embedded quotes.
pub fn escape_command_for_shell(command: &str) -> String {
    format!("'{}'", escape_single_quote_content(command))
}

/// Prefix a command with a `cd` into `dir`, short-circuiting on failure.
pub fn in_directory(dir: &str, command: &str) -> String {
    format!("cd {} && {}", quote_path(dir), command)
}

/// Run a whole command line as root without prompting for a password.
///
/// The command is wrapped in `sh -c` so pipelines and `&&` chains are
/// elevated as a unit instead of only their first program.
pub fn elevated(command: &str) -> String {
    format!("sudo -n sh -c {}", escape_command_for_shell(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_path_with_quote() {
        assert_eq!(quote_path("/opt/it's"), "'/opt/it'\\''s'");
    }

    #[test]
    fn in_directory_quotes_path() {
        assert_eq!(
            in_directory("/opt/hmasp chat", "git pull origin main"),
            "cd '/opt/hmasp chat' && git pull origin main"
        );
    }

    #[test]
    fn elevated_wraps_whole_pipeline() {
        assert_eq!(
            elevated("systemctl status app --no-pager | head -20"),
            "sudo -n sh -c 'systemctl status app --no-pager | head -20'"
        );
    }

    #[test]
    fn elevated_escapes_embedded_quotes() {
        assert_eq!(
            elevated("echo 'done'"),
            "sudo -n sh -c 'echo '\\''done'\\'''"
        );
    }
}
