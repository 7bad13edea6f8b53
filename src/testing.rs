//! Test doubles shared by the unit tests.

use std::cell::RefCell;
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use crate::exec::{Cmd, Executor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Probe(Cmd),
    Run(Cmd),
    Pipeline(Vec<Cmd>),
}

type RunHook = Box<dyn Fn(&Cmd) -> bool>;

/// Records every command instead of spawning it.
pub struct RecordingExecutor {
    /// Programs that `locate` reports as absent.
    pub missing: HashSet<String>,
    /// Probes whose rendered command line appears here fail.
    pub failing_probes: HashSet<String>,
    /// Decides the outcome of `run`; may touch the filesystem to simulate a tool.
    pub on_run: RunHook,
    pub pipeline_ok: bool,
    pub log: RefCell<Vec<Call>>,
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self {
            missing: HashSet::new(),
            failing_probes: HashSet::new(),
            on_run: Box::new(|_| true),
            pipeline_ok: true,
            log: RefCell::new(Vec::new()),
        }
    }
}

impl RecordingExecutor {
    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Probe(_)))
            .collect()
    }
}

#[cfg(unix)]
pub fn exit_status(ok: bool) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(if ok { 0 } else { 1 << 8 })
}

#[cfg(windows)]
pub fn exit_status(ok: bool) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(if ok { 0 } else { 1 })
}

impl Executor for RecordingExecutor {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        if self.missing.contains(program) {
            None
        } else {
            Some(PathBuf::from("/usr/bin").join(program))
        }
    }

    fn probe(&self, cmd: &Cmd) -> io::Result<bool> {
        self.log.borrow_mut().push(Call::Probe(cmd.clone()));
        Ok(!self.failing_probes.contains(&cmd.to_string()))
    }

    fn run(&self, cmd: &Cmd) -> io::Result<ExitStatus> {
        self.log.borrow_mut().push(Call::Run(cmd.clone()));
        Ok(exit_status((self.on_run)(cmd)))
    }

    fn pipeline(&self, stages: &[Cmd]) -> io::Result<Vec<ExitStatus>> {
        self.log.borrow_mut().push(Call::Pipeline(stages.to_vec()));
        Ok(stages.iter().map(|_| exit_status(self.pipeline_ok)).collect())
    }
}
