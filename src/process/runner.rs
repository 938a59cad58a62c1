// shopsync/src/process/runner.rs
use std::io::{Read, Write};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

use super::{Invocation, ProcessError, RunOutput};

/// Executes subprocess invocations. The pipeline code only talks to this
/// trait, so tests can substitute a recording fake for the system runner.
pub trait ProcessRunner {
    /// Runs the invocation with stdin closed, capturing stdout and stderr.
    fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<RunOutput, ProcessError>;

    /// Runs the invocation with its stdin fed by `feed`. The writer is closed
    /// when `feed` returns, signalling end of input to the child.
    fn run_with_input(
        &self,
        invocation: &Invocation,
        feed: &mut dyn FnMut(&mut dyn Write) -> std::io::Result<()>,
        timeout: Duration,
    ) -> Result<RunOutput, ProcessError>;
}

pub struct SystemRunner;

impl SystemRunner {
    fn spawn(invocation: &Invocation, stdin: Stdio) -> Result<Child, ProcessError> {
        Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k, v)))
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: invocation.program.clone(),
                source,
            })
    }

    fn wait_collect(
        invocation: &Invocation,
        mut child: Child,
        timeout: Duration,
    ) -> Result<RunOutput, ProcessError> {
        let stdout_handle = spawn_reader(child.stdout.take());
        let stderr_handle = spawn_err_reader(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            let polled = child.try_wait().map_err(|source| ProcessError::Io {
                program: invocation.program.clone(),
                source,
            })?;
            match polled {
                Some(status) => break status,
                None => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ProcessError::Timeout {
                            program: invocation.program.clone(),
                            seconds: timeout.as_secs(),
                        });
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        };

        Ok(RunOutput {
            status: status.code(),
            stdout: stdout_handle.join().unwrap_or_default(),
            stderr: stderr_handle.join().unwrap_or_default(),
        })
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, timeout: Duration) -> Result<RunOutput, ProcessError> {
        let child = Self::spawn(invocation, Stdio::null())?;
        Self::wait_collect(invocation, child, timeout)
    }

    fn run_with_input(
        &self,
        invocation: &Invocation,
        feed: &mut dyn FnMut(&mut dyn Write) -> std::io::Result<()>,
        timeout: Duration,
    ) -> Result<RunOutput, ProcessError> {
        let mut child = Self::spawn(invocation, Stdio::piped())?;
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(source) = feed(&mut stdin) {
                // A child that exits early closes the pipe; let the exit
                // status tell the real story instead of the broken pipe.
                if source.kind() != std::io::ErrorKind::BrokenPipe {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ProcessError::Io {
                        program: invocation.program.clone(),
                        source,
                    });
                }
            }
        }
        Self::wait_collect(invocation, child, timeout)
    }
}

// Readers run on their own threads so a full pipe never deadlocks try_wait.
fn spawn_reader(stdout: Option<ChildStdout>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut handle) = stdout {
            let _ = handle.read_to_string(&mut buffer);
        }
        buffer
    })
}

fn spawn_err_reader(stderr: Option<ChildStderr>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut handle) = stderr {
            let _ = handle.read_to_string(&mut buffer);
        }
        buffer
    })
}
