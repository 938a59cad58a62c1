// shopsync/src/process/fake.rs
//! Recording process runner for tests. Replays scripted outputs in order and
//! can drop a file at a program's last argument to stand in for scp.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::time::Duration;

use super::runner::ProcessRunner;
use super::{Invocation, ProcessError, RunOutput};

#[derive(Default)]
pub struct FakeRunner {
    pub calls: RefCell<Vec<Invocation>>,
    pub inputs: RefCell<Vec<Vec<u8>>>,
    pub outputs: RefCell<VecDeque<RunOutput>>,
    /// program name -> bytes written to the invocation's last argument,
    /// interpreted as a local path, whenever that program runs.
    pub file_drops: RefCell<HashMap<String, Vec<u8>>>,
}

impl FakeRunner {
    pub fn with_outputs(outputs: Vec<RunOutput>) -> Self {
        FakeRunner {
            outputs: RefCell::new(outputs.into()),
            ..FakeRunner::default()
        }
    }

    pub fn drop_file_for(self, program: &str, bytes: &[u8]) -> Self {
        self.file_drops
            .borrow_mut()
            .insert(program.to_string(), bytes.to_vec());
        self
    }

    pub fn ok() -> RunOutput {
        RunOutput {
            status: Some(0),
            ..RunOutput::default()
        }
    }

    pub fn ok_with_stdout(stdout: &str) -> RunOutput {
        RunOutput {
            status: Some(0),
            stdout: stdout.to_string(),
            ..RunOutput::default()
        }
    }

    pub fn failed(stderr: &str) -> RunOutput {
        RunOutput {
            status: Some(1),
            stderr: stderr.to_string(),
            ..RunOutput::default()
        }
    }

    pub fn programs_called(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|call| call.program.clone())
            .collect()
    }

    fn record(&self, invocation: &Invocation) -> RunOutput {
        if let Some(bytes) = self.file_drops.borrow().get(&invocation.program) {
            if let Some(path) = invocation.args.last() {
                let _ = std::fs::write(path, bytes);
            }
        }
        self.calls.borrow_mut().push(invocation.clone());
        self.outputs
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(Self::ok)
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, invocation: &Invocation, _timeout: Duration) -> Result<RunOutput, ProcessError> {
        Ok(self.record(invocation))
    }

    fn run_with_input(
        &self,
        invocation: &Invocation,
        feed: &mut dyn FnMut(&mut dyn Write) -> std::io::Result<()>,
        _timeout: Duration,
    ) -> Result<RunOutput, ProcessError> {
        let mut buffer = Vec::new();
        feed(&mut buffer).map_err(|source| ProcessError::Io {
            program: invocation.program.clone(),
            source,
        })?;
        self.inputs.borrow_mut().push(buffer);
        Ok(self.record(invocation))
    }
}
