//! Test doubles for the subprocess boundary.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{KeychainError, Result};
use crate::runner::{CommandOutput, CommandRunner, ExitCode, Invocation};

#[derive(Debug, Clone)]
enum Reply {
    Exit { code: i32, stdout: String },
    SpawnFailure,
}

/// Records every invocation and answers from a script.
///
/// Queued replies are consumed first; once the queue is empty every call
/// gets the fallback reply.
pub struct RecordingRunner {
    invocations: Mutex<Vec<Invocation>>,
    queued: Mutex<VecDeque<Reply>>,
    fallback: Reply,
}

impl RecordingRunner {
    fn with_fallback(fallback: Reply) -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            queued: Mutex::new(VecDeque::new()),
            fallback,
        }
    }

    /// Every call exits 0 with no output
    pub fn succeeding() -> Self {
        Self::exiting(0)
    }

    pub fn exiting(code: i32) -> Self {
        Self::with_fallback(Reply::Exit {
            code,
            stdout: String::new(),
        })
    }

    pub fn printing(stdout: &str) -> Self {
        Self::with_fallback(Reply::Exit {
            code: 0,
            stdout: stdout.to_string(),
        })
    }

    /// Every call fails as if the program could not be started
    pub fn failing_to_start() -> Self {
        Self::with_fallback(Reply::SpawnFailure)
    }

    pub fn then_exit(self, code: i32, stdout: &str) -> Self {
        self.queued
            .lock()
            .expect("reply queue poisoned")
            .push_back(Reply::Exit {
                code,
                stdout: stdout.to_string(),
            });
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().expect("invocations poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.invocations.lock().expect("invocations poisoned").len()
    }

    /// Arguments of the only recorded invocation
    pub fn only_args(&self) -> Vec<String> {
        let invocations = self.invocations();
        assert_eq!(invocations.len(), 1, "expected exactly one invocation");
        invocations[0].args.clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.invocations
            .lock()
            .expect("invocations poisoned")
            .push(invocation.clone());

        let reply = self
            .queued
            .lock()
            .expect("reply queue poisoned")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            Reply::Exit { code, stdout } => Ok(CommandOutput {
                status: ExitCode::new(code),
                stdout: if invocation.capture_stdout {
                    stdout.into_bytes()
                } else {
                    Vec::new()
                },
                stderr: if code == 0 {
                    Vec::new()
                } else {
                    b"security: SecKeychainOpen: The specified keychain could not be found."
                        .to_vec()
                },
            }),
            Reply::SpawnFailure => Err(KeychainError::CommandExecution(format!(
                "'{}' command not available",
                invocation.program
            ))),
        }
    }
}

/// Assert that `args` equals the expected literal argument list
pub fn assert_args(args: &[String], expected: &[&str]) {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    assert_eq!(args, expected);
}
