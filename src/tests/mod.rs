mod password;
mod runner;
mod secrets;

use std::cell::RefCell;

use anyhow::Result;

use crate::runner::{Cmd, CmdOutput, Runner};

/// Scripted stand-in for ShellRunner: hands out canned outputs in order and
/// records every command it was asked to execute. Once the script runs dry,
/// further commands succeed with empty output.
pub struct RecordingRunner {
    outputs: RefCell<Vec<CmdOutput>>,
    pub calls: RefCell<Vec<Cmd>>,
}

impl RecordingRunner {
    pub fn scripted(outputs: Vec<CmdOutput>) -> Self {
        RecordingRunner {
            outputs: RefCell::new(outputs),
            calls: RefCell::new(vec![]),
        }
    }

    pub fn always_ok() -> Self {
        Self::scripted(vec![])
    }

    /// command lines executed so far
    pub fn lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.line.clone()).collect()
    }
}

impl Runner for RecordingRunner {
    fn run_one(&self, cmd: &Cmd) -> Result<CmdOutput> {
        self.calls.borrow_mut().push(cmd.clone());

        let mut outputs = self.outputs.borrow_mut();
        if outputs.is_empty() {
            Ok(CmdOutput::default())
        } else {
            Ok(outputs.remove(0))
        }
    }
}
