//! Subprocess invocation for the `security` tool
//!
//! Every facade operation builds an [`Invocation`] and hands it to a
//! [`CommandRunner`]. [`SecurityRunner`] is the process-backed
//! implementation; tests substitute a recording runner.

use std::fmt;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use zeroize::Zeroizing;

use crate::config::SECURITY_PROGRAM;
use crate::error::{KeychainError, Result};

/// Exit code reported by the wrapped tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: Self = Self(0);

    #[must_use]
    pub const fn new(code: i32) -> Self {
        Self(code)
    }

    /// Signal termination has no code and maps to `-1`
    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        Self(status.code().unwrap_or(-1))
    }

    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One call of an external program
#[derive(Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<Zeroizing<Vec<u8>>>,
    pub capture_stdout: bool,
}

impl Invocation {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            capture_stdout: false,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `arg` only when present
    #[must_use]
    pub fn arg_opt(self, arg: Option<impl Into<String>>) -> Self {
        match arg {
            Some(arg) => self.arg(arg),
            None => self,
        }
    }

    #[must_use]
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(Zeroizing::new(input.into()));
        self
    }

    #[must_use]
    pub fn capture_stdout(mut self) -> Self {
        self.capture_stdout = true;
        self
    }

    /// First argument, e.g. `create-keychain`
    #[must_use]
    pub fn subcommand(&self) -> &str {
        self.args.first().map_or("", String::as_str)
    }

    #[must_use]
    pub fn stdin_bytes(&self) -> Option<&[u8]> {
        self.stdin.as_ref().map(|input| input.as_slice())
    }
}

// Arguments and stdin carry passwords, so only their shape is printed.
impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("subcommand", &self.subcommand())
            .field("args", &self.args.len())
            .field("stdin", &self.stdin.as_ref().map(|input| input.len()))
            .field("capture_stdout", &self.capture_stdout)
            .finish()
    }
}

/// Result of a finished invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: ExitCode,
    /// Empty unless the invocation captured output
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Runs external programs on behalf of the command facade.
///
/// `Err` means the program could not be run at all. A program that ran
/// and exited non-zero is an `Ok` with a failing [`ExitCode`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Spawns the program with `tokio::process`.
///
/// Captured invocations pipe stdout and stderr; the rest inherit the
/// parent's streams so the tool's own output stays visible. The child is
/// killed if the returned future is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityRunner;

#[async_trait]
impl CommandRunner for SecurityRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        tracing::debug!(
            program = %invocation.program,
            subcommand = invocation.subcommand(),
            args = invocation.args.len(),
            stdin = invocation.stdin.is_some(),
            "running"
        );

        let mut command = tokio::process::Command::new(&invocation.program);
        command.args(&invocation.args).kill_on_drop(true);

        command.stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        if invocation.capture_stdout {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KeychainError::CommandExecution(format!(
                    "'{}' command not available",
                    invocation.program
                ))
            } else {
                KeychainError::CommandExecution(format!(
                    "Failed to execute {} {}: {e}",
                    invocation.program,
                    invocation.subcommand()
                ))
            }
        })?;

        if let Some(input) = &invocation.stdin {
            let mut stdin = child.stdin.take().ok_or_else(|| {
                KeychainError::CommandExecution("child stdin was not piped".to_string())
            })?;
            match stdin.write_all(input).await {
                Ok(()) => {}
                // The tool may exit before reading its prompts; its status still decides.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!(
                        subcommand = invocation.subcommand(),
                        "stdin closed before all input was written"
                    );
                }
                Err(e) => {
                    return Err(KeychainError::CommandExecution(format!(
                        "Failed to write stdin of {} {}: {e}",
                        invocation.program,
                        invocation.subcommand()
                    )));
                }
            }
            // Closing stdin lets the tool see EOF after the last prompt.
            drop(stdin);
        }

        let output = child.wait_with_output().await?;
        let status = ExitCode::from_status(output.status);

        if !status.is_success() {
            tracing::debug!(
                subcommand = invocation.subcommand(),
                code = status.code(),
                "command exited non-zero"
            );
        }

        Ok(CommandOutput {
            status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Invocation of the default `security` program
#[must_use]
pub fn security() -> Invocation {
    Invocation::new(SECURITY_PROGRAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_argument_order() {
        let invocation = security()
            .arg("unlock-keychain")
            .args(["-p", "secret"])
            .arg_opt(None::<String>)
            .arg_opt(Some("/tmp/a.keychain-db"));

        assert_eq!(invocation.program, "security");
        assert_eq!(
            invocation.args,
            vec!["unlock-keychain", "-p", "secret", "/tmp/a.keychain-db"]
        );
        assert_eq!(invocation.subcommand(), "unlock-keychain");
        assert!(invocation.stdin_bytes().is_none());
        assert!(!invocation.capture_stdout);
    }

    #[test]
    fn debug_output_hides_arguments_and_stdin() {
        let invocation = security()
            .args(["create-keychain", "-p", "hunter2"])
            .stdin("hunter2\n");
        let printed = format!("{invocation:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("create-keychain"));
    }

    #[test]
    fn exit_code_success() {
        assert!(ExitCode::SUCCESS.is_success());
        assert!(!ExitCode::new(51).is_success());
        assert_eq!(ExitCode::new(51).code(), 51);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runner_reports_non_zero_exit_as_ok() {
        let invocation = Invocation::new("sh").args(["-c", "exit 3"]).capture_stdout();
        let output = SecurityRunner.run(&invocation).await.unwrap();
        assert_eq!(output.status, ExitCode::new(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runner_feeds_stdin_and_captures_stdout() {
        let invocation = Invocation::new("cat")
            .stdin("old\nnew\nnew")
            .capture_stdout();
        let output = SecurityRunner.run(&invocation).await.unwrap();
        assert!(output.status.is_success());
        assert_eq!(output.stdout_lossy(), "old\nnew\nnew");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_status_survives_closed_stdin() {
        let invocation = Invocation::new("sh")
            .args(["-c", "exec 0<&-; exit 51"])
            .stdin(vec![b'x'; 1 << 20])
            .capture_stdout();
        let output = SecurityRunner.run(&invocation).await.unwrap();
        assert_eq!(output.status, ExitCode::new(51));
    }

    #[tokio::test]
    async fn runner_fails_for_missing_program() {
        let invocation = Invocation::new("definitely-not-a-real-program-4f1c").arg("help");
        let err = SecurityRunner.run(&invocation).await.unwrap_err();
        assert!(matches!(err, KeychainError::CommandExecution(_)));
    }
}
