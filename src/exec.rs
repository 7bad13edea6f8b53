//! External command execution.
//!
//! Every external program this tool touches is described by a [`Cmd`] and
//! executed through an [`Executor`]. The production executor spawns real
//! processes; tests substitute a recording fake.
//!
//! [`Session`] sits on top of an executor and applies the dry-run and verbose
//! switches: commands that change state go through [`Session::run`] and
//! [`Session::pipeline`] and are only echoed in dry-run mode, while
//! inspection commands go through [`Session::probe`] and always execute.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};

use crate::output;

/// A single external command line.
///
/// Environment entries are applied to the child only and are never shown in
/// echoes, which is how secrets reach a child without landing in argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    pub program: String,
    pub args: Vec<OsString>,
    pub dir: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Arguments as lossy strings, for assertions.
    #[cfg(test)]
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        command
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dir) = &self.dir {
            write!(f, "(cd {} && ", quote(&dir.to_string_lossy()))?;
        }
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(&arg.to_string_lossy()))?;
        }
        if self.dir.is_some() {
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Quote a word so the echoed line can be pasted into a POSIX shell.
fn quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Render a pipeline the way a shell would spell it.
pub fn render_pipeline(stages: &[Cmd]) -> String {
    stages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

pub trait Executor {
    /// Resolve a program name to an executable path.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run an inspection command with stdout discarded; `true` on success.
    fn probe(&self, cmd: &Cmd) -> io::Result<bool>;

    /// Run a command with inherited stdio.
    fn run(&self, cmd: &Cmd) -> io::Result<ExitStatus>;

    /// Connect the stages stdout-to-stdin, wait for all of them and return
    /// each stage's exit status in order.
    fn pipeline(&self, stages: &[Cmd]) -> io::Result<Vec<ExitStatus>>;
}

/// Spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    fn probe(&self, cmd: &Cmd) -> io::Result<bool> {
        let status = cmd
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()?;
        Ok(status.success())
    }

    fn run(&self, cmd: &Cmd) -> io::Result<ExitStatus> {
        cmd.to_command().status()
    }

    fn pipeline(&self, stages: &[Cmd]) -> io::Result<Vec<ExitStatus>> {
        let mut children: Vec<Child> = Vec::with_capacity(stages.len());
        let mut upstream: Option<ChildStdout> = None;

        for (index, stage) in stages.iter().enumerate() {
            let mut command = stage.to_command();
            if let Some(stdout) = upstream.take() {
                command.stdin(Stdio::from(stdout));
            }
            if index + 1 < stages.len() {
                command.stdout(Stdio::piped());
            }

            match command.spawn() {
                Ok(mut child) => {
                    upstream = child.stdout.take();
                    children.push(child);
                }
                Err(err) => {
                    for mut child in children {
                        let _ = child.kill();
                        let _ = child.wait();
                    }
                    let place = match &stage.dir {
                        Some(dir) => format!(" in {}", dir.display()),
                        None => String::new(),
                    };
                    return Err(io::Error::new(
                        err.kind(),
                        format!("failed to start `{}`{}: {}", stage.program, place, err),
                    ));
                }
            }
        }

        let waited: Vec<_> = children.iter_mut().map(Child::wait).collect();
        first_failure(waited)
    }
}

/// Every child has been waited on by the time this runs; keep the first error.
fn first_failure(waited: Vec<io::Result<ExitStatus>>) -> io::Result<Vec<ExitStatus>> {
    let mut statuses = Vec::with_capacity(waited.len());
    let mut error = None;
    for result in waited {
        match result {
            Ok(status) => statuses.push(status),
            Err(e) => {
                error.get_or_insert(e);
            }
        }
    }
    match error {
        Some(e) => Err(e),
        None => Ok(statuses),
    }
}

/// Executor plus the per-invocation dry-run and verbose switches.
pub struct Session<E> {
    executor: E,
    dry_run: bool,
    verbose: bool,
}

impl<E: Executor> Session<E> {
    pub fn new(executor: E, dry_run: bool, verbose: bool) -> Self {
        Self {
            executor,
            dry_run,
            verbose,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    #[cfg(test)]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn locate(&self, program: &str) -> Option<PathBuf> {
        let found = self.executor.locate(program);
        tracing::debug!(program, path = ?found, "tool lookup");
        found
    }

    /// Inspection commands run even in dry-run mode.
    pub fn probe(&self, cmd: &Cmd) -> io::Result<bool> {
        if self.verbose {
            output::verbose(&cmd.to_string());
        }
        let ok = self.executor.probe(cmd)?;
        tracing::debug!(command = %cmd, ok, "probe finished");
        Ok(ok)
    }

    pub fn run(&self, cmd: &Cmd) -> io::Result<bool> {
        if self.dry_run {
            output::dry_run(&cmd.to_string());
            return Ok(true);
        }
        if self.verbose {
            output::verbose(&cmd.to_string());
        }
        let status = self.executor.run(cmd)?;
        tracing::debug!(command = %cmd, ?status, "command finished");
        Ok(status.success())
    }

    /// Runs the pipeline and reports whether every stage succeeded.
    pub fn pipeline(&self, stages: &[Cmd]) -> io::Result<bool> {
        let rendered = render_pipeline(stages);
        if self.dry_run {
            output::dry_run(&rendered);
            return Ok(true);
        }
        if self.verbose {
            output::verbose(&rendered);
        }

        let statuses = self.executor.pipeline(stages)?;
        for (stage, status) in stages.iter().zip(&statuses) {
            tracing::debug!(stage = %stage.program, ?status, "pipeline stage finished");
        }
        Ok(statuses.iter().all(ExitStatus::success))
    }

    pub fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        if self.dry_run {
            output::dry_run(&format!("mkdir -p {}", quote(&dir.to_string_lossy())));
            return Ok(());
        }
        tracing::debug!(dir = %dir.display(), "creating directory");
        fs::create_dir_all(dir)
    }
}
