use clap::Parser;

use std::ffi::OsString;

use crate::config::Config;
use crate::credentials;
use crate::error::Result;
use crate::exec::{Executor, ProcessExecutor, Session};
use crate::ignore;
use crate::invocation::{self, Direction, Invocation};
use crate::pipeline;
use crate::precheck;
use crate::prompt::{Prompt, TerminalPrompt};
use crate::workdir;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(override_usage = "sealtar [OPTIONS] PATH... gs://BUCKET/OBJECT [-- TAR_ARGS...]\n       \
                            sealtar [OPTIONS] gs://BUCKET/OBJECT DIR")]
#[command(after_help = "Environment:\n  \
    SEALTAR_KEY     private key   [default: ~/.sealtar/key.pem]\n  \
    SEALTAR_CERT    certificate   [default: ~/.sealtar/cert.pem]\n  \
    SEALTAR_IGNORE  glob patterns excluded from uploads [default: ~/.sealtar/ignore]")]
pub struct Cli {
    /// Print the commands that would change anything instead of running them
    #[arg(short, long)]
    pub dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Upload: local paths plus one gs:// destination. Download: a gs:// source and a local directory
    #[arg(value_name = "ARGS")]
    pub targets: Vec<OsString>,

    /// Extra tar arguments, uploads only
    #[arg(last = true, value_name = "TAR_ARGS")]
    pub tar_args: Vec<OsString>,
}

impl Cli {
    pub fn run(&self) -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let invocation = invocation::classify(self, &cwd)?;
        let config = Config::from_env();
        let session = Session::new(ProcessExecutor, invocation.dry_run, invocation.verbose);
        execute(&invocation, &config, &session, &mut TerminalPrompt)?;
        Ok(())
    }
}

/// Validate, bootstrap if needed, then run exactly one transfer.
pub fn execute<E: Executor, P: Prompt>(
    invocation: &Invocation,
    config: &Config,
    session: &Session<E>,
    prompt: &mut P,
) -> Result<()> {
    precheck::verify_toolchain(session, &config.tools)?;
    precheck::verify_identity(session, &config.tools)?;
    credentials::ensure(session, prompt, config)?;

    if let Some(dir) = invocation.sync_dir.as_deref() {
        workdir::prepare(session, prompt, dir)?;
    }

    match invocation.direction {
        Direction::Upload => {
            let patterns = ignore::load(&config.ignore_path)?;
            pipeline::upload(session, config, invocation, &patterns)
        }
        Direction::Download => pipeline::download(session, config, invocation),
    }
}

/// Full help text, shown after usage errors.
pub fn usage() -> String {
    use clap::CommandFactory;
    Cli::command().render_help().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SealtarError;
    use crate::prompt::MockPrompt;
    use crate::testing::{Call, RecordingExecutor};
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
        config: Config,
    }

    /// A workspace with credentials, an ignore file and `a/b` + `c` to upload.
    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("c"), "c").unwrap();
        fs::write(root.join("key.pem"), "KEY").unwrap();
        fs::write(root.join("cert.pem"), "CERT").unwrap();
        let config = Config {
            key_path: root.join("key.pem"),
            cert_path: root.join("cert.pem"),
            ignore_path: root.join("ignore"),
            tools: Default::default(),
        };
        Fixture { dir, config }
    }

    fn parse(fixture: &Fixture, args: &[&str]) -> Invocation {
        let cli = Cli::try_parse_from(std::iter::once("sealtar").chain(args.iter().copied()))
            .unwrap();
        invocation::classify(&cli, fixture.dir.path()).unwrap()
    }

    #[test]
    fn test_usage_mentions_both_forms() {
        let text = usage();
        assert!(text.contains("gs://BUCKET/OBJECT DIR"));
        assert!(text.contains("TAR_ARGS"));
        assert!(text.contains("SEALTAR_KEY"));
    }

    #[test]
    fn test_upload_scenario() -> anyhow::Result<()> {
        let fixture = fixture();
        let invocation = parse(&fixture, &["a/b", "c", "gs://bkt/x.pkg"]);
        let session = Session::new(RecordingExecutor::default(), false, false);
        let mut prompt = MockPrompt::new();
        prompt.expect_confirm().never();

        execute(&invocation, &fixture.config, &session, &mut prompt)?;

        let calls = session.executor().calls();
        assert_eq!(calls.len(), 3, "{:?}", calls);
        assert!(matches!(&calls[0], Call::Probe(c) if c.to_string() == "gsutil ls"));
        assert!(matches!(&calls[1], Call::Probe(c) if c.to_string() == "gsutil ls -b gs://bkt"));
        let Call::Pipeline(stages) = &calls[2] else {
            panic!("expected pipeline");
        };
        assert_eq!(stages[0].to_string(), "tar -cz -f - a/b c");
        assert_eq!(stages[1].program, "openssl");
        assert_eq!(stages[2].to_string(), "gsutil cp - gs://bkt/x.pkg");
        Ok(())
    }

    #[test]
    fn test_upload_applies_ignore_file() -> anyhow::Result<()> {
        let fixture = fixture();
        fs::write(&fixture.config.ignore_path, "*.tmp\n")?;
        let invocation = parse(&fixture, &["c", "gs://bkt/x.pkg", "--", "--totals"]);
        let session = Session::new(RecordingExecutor::default(), false, false);
        let mut prompt = MockPrompt::new();

        execute(&invocation, &fixture.config, &session, &mut prompt)?;

        let calls = session.executor().calls();
        let Call::Pipeline(stages) = &calls[2] else {
            panic!("expected pipeline");
        };
        assert_eq!(
            stages[0].to_string(),
            "tar -cz -f - '--exclude=*.tmp' --totals c"
        );
        Ok(())
    }

    #[test]
    fn test_dry_run_mutates_nothing() -> anyhow::Result<()> {
        let fixture = fixture();
        fs::remove_file(&fixture.config.key_path)?;
        let target = fixture.dir.path().join("restore");
        let session = Session::new(
            RecordingExecutor {
                failing_probes: ["gsutil ls -b gs://bkt".to_string()].into(),
                ..Default::default()
            },
            true,
            false,
        );
        let mut prompt = MockPrompt::new();
        prompt.expect_confirm().returning(|q| Ok(!q.contains("passphrase")));

        let upload = parse(&fixture, &["-d", "a/b", "gs://bkt/x.pkg"]);
        execute(&upload, &fixture.config, &session, &mut prompt)?;
        let download = parse(&fixture, &["-d", "gs://bkt/x.pkg", "restore"]);
        execute(&download, &fixture.config, &session, &mut prompt)?;

        assert!(session.executor().mutating_calls().is_empty());
        assert!(!fixture.config.key_path.exists());
        assert!(!target.exists());
        Ok(())
    }

    #[test]
    fn test_declined_download_directory_aborts_before_transfer() {
        let fixture = fixture();
        let invocation = parse(&fixture, &["gs://bkt/x.pkg", "/tmp/sealtar-never-created-out"]);
        let session = Session::new(RecordingExecutor::default(), false, false);
        let mut prompt = MockPrompt::new();
        prompt
            .expect_confirm()
            .withf(|q| q.contains("does not exist"))
            .times(1)
            .returning(|_| Ok(false));

        let err = execute(&invocation, &fixture.config, &session, &mut prompt).unwrap_err();

        assert!(matches!(err, SealtarError::Aborted(_)));
        assert!(session.executor().mutating_calls().is_empty());
        assert!(!Path::new("/tmp/sealtar-never-created-out").exists());
    }

    #[test]
    fn test_broken_credentials_stop_everything() {
        let fixture = fixture();
        let invocation = parse(&fixture, &["c", "gs://bkt/x.pkg"]);
        let session = Session::new(
            RecordingExecutor {
                failing_probes: ["gsutil ls".to_string()].into(),
                ..Default::default()
            },
            false,
            false,
        );
        let mut prompt = MockPrompt::new();
        prompt.expect_confirm().never();

        let err = execute(&invocation, &fixture.config, &session, &mut prompt).unwrap_err();

        assert!(matches!(err, SealtarError::Credential(_)));
        assert_eq!(session.executor().calls().len(), 1);
    }

    #[test]
    fn test_missing_tool_stops_before_any_command() {
        let fixture = fixture();
        let invocation = parse(&fixture, &["c", "gs://bkt/x.pkg"]);
        let session = Session::new(
            RecordingExecutor {
                missing: ["gsutil".to_string()].into(),
                ..Default::default()
            },
            false,
            false,
        );
        let mut prompt = MockPrompt::new();

        let err = execute(&invocation, &fixture.config, &session, &mut prompt).unwrap_err();

        assert!(matches!(err, SealtarError::ToolMissing(ref t) if t == "gsutil"));
        assert!(session.executor().calls().is_empty());
    }
}
