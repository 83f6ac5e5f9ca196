// Seams between the pipeline and the outside world

use async_trait::async_trait;
use std::fmt;

use super::errors::Result;
use super::models::HostEnvironment;

/// An external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Inherit the terminal instead of capturing output (package managers may prompt).
    pub attached: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            attached: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn attached(mut self) -> Self {
        self.attached = true;
        self
    }

    /// Does the argument list contain `flag`?
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Value following `flag`, if any.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|idx| self.args.get(idx + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external commands. Waits for the child to exit; no timeout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// `Err` means the process could not be started at all.
    async fn run(&self, cmd: &CommandSpec, env: &HostEnvironment) -> std::io::Result<ProcessOutput>;
}

/// Checks whether a tool can be invoked under a given name.
#[async_trait]
pub trait ToolProbe: Send + Sync {
    /// Name of the tool (for logging)
    fn name(&self) -> &'static str;

    /// Any invocation failure counts as "not present".
    async fn is_present(&self, program: &str, env: &HostEnvironment) -> bool;
}

/// Fetches a remote binary.
#[async_trait]
pub trait BinaryFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_spec_builds_and_displays() {
        let cmd = CommandSpec::new("yt-dlp")
            .arg("-f")
            .arg("140")
            .args(["https://example.com/v", "-o", "my_audio.m4a"]);

        assert_eq!(cmd.to_string(), "yt-dlp -f 140 https://example.com/v -o my_audio.m4a");
        assert!(cmd.has_arg("-o"));
        assert_eq!(cmd.arg_after("-f"), Some("140"));
        assert_eq!(cmd.arg_after("-o"), Some("my_audio.m4a"));
        assert_eq!(cmd.arg_after("--missing"), None);
        assert!(!cmd.attached);
    }
}
