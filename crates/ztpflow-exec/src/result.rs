//! Result types for command execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Output of one CLI command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status code (0 for success)
    pub status: i32,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command exited with status 0
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Non-empty, trimmed stdout lines
    #[must_use]
    pub fn stdout_lines(&self) -> Vec<String> {
        non_empty_lines(&self.stdout)
    }

    /// Non-empty, trimmed stderr lines
    #[must_use]
    pub fn stderr_lines(&self) -> Vec<String> {
        non_empty_lines(&self.stderr)
    }
}

fn non_empty_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Where and as whom to open an SSH session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Switch management address
    pub host: String,
    /// Port (default 22)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login user
    pub user: String,
}

fn default_port() -> u16 {
    22
}

impl ConnectionInfo {
    /// Create new connection info on the default port
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            user: user.into(),
        }
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_skip_blank_output() {
        let result = CommandResult {
            status: 0,
            stdout: "spine1\n\n  spine2  \n".to_string(),
            stderr: String::new(),
            duration: Duration::from_millis(3),
        };

        assert_eq!(result.stdout_lines(), vec!["spine1", "spine2"]);
        assert!(result.stderr_lines().is_empty());
    }
}
