use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::{process, ChannelOutput, RemoteChannel};
use crate::error::{Error, Result};

/// Runs commands on this machine through the system shell.
#[derive(Debug, Default)]
pub struct LocalChannel;

impl LocalChannel {
    pub fn new() -> Self {
        Self
    }
}

impl RemoteChannel for LocalChannel {
    fn describe(&self) -> String {
        "local shell".to_string()
    }

    fn execute_with_input(
        &self,
        command: &str,
        stdin_file: Option<&Path>,
        timeout: Duration,
    ) -> Result<ChannelOutput> {
        #[cfg(windows)]
        let cmd = {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        };

        #[cfg(not(windows))]
        let cmd = {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        };

        process::run(cmd, stdin_file, timeout)
            .map_err(|e| Error::ssh_connect_failed(self.describe(), format!("Command error: {}", e), ""))
    }
}
