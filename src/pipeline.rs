//! The three-stage transfer pipelines.
//!
//! Upload:   archiver (create) | cipher (seal to certificate) | transport (put)
//! Download: transport (get) | cipher (open with private key) | archiver (extract)
//!
//! Each stage is a separate process; the OS pipe buffers between them provide
//! all the backpressure there is. A failure in any stage fails the transfer.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::{Config, Toolchain};
use crate::error::{Result, SealtarError};
use crate::exec::{Cmd, Executor, Session};
use crate::ignore;
use crate::invocation::{BucketPath, Invocation};
use crate::output;

/// `tar -cz -f - [--exclude=..] [pass-through] PATH...`
pub fn archive_command(
    tools: &Toolchain,
    sync_dir: Option<&Path>,
    patterns: &[String],
    pass_through: &[OsString],
    paths: &[PathBuf],
) -> Cmd {
    let cmd = Cmd::new(&tools.archiver)
        .args(["-cz", "-f", "-"])
        .args(ignore::exclude_flags(patterns))
        .args(pass_through)
        .args(paths);
    match sync_dir {
        Some(dir) => cmd.current_dir(dir),
        None => cmd,
    }
}

/// `openssl smime -encrypt -binary -aes256 -outform DER CERT`
pub fn seal_command(tools: &Toolchain, cert: &Path) -> Cmd {
    Cmd::new(&tools.cipher)
        .args(["smime", "-encrypt", "-binary", "-aes256", "-outform", "DER"])
        .arg(cert)
}

pub fn put_command(tools: &Toolchain, destination: &BucketPath) -> Cmd {
    Cmd::new(&tools.transport)
        .args(["cp", "-"])
        .arg(destination.to_string())
}

pub fn get_command(tools: &Toolchain, source: &BucketPath) -> Cmd {
    Cmd::new(&tools.transport)
        .arg("cp")
        .arg(source.to_string())
        .arg("-")
}

/// `openssl smime -decrypt -binary -inform DER -inkey KEY`
pub fn open_command(tools: &Toolchain, key: &Path) -> Cmd {
    Cmd::new(&tools.cipher)
        .args(["smime", "-decrypt", "-binary", "-inform", "DER", "-inkey"])
        .arg(key)
}

/// `tar -xz [-v] -f -`, run inside the sync directory.
pub fn extract_command(tools: &Toolchain, sync_dir: Option<&Path>, verbose: bool) -> Cmd {
    let mut cmd = Cmd::new(&tools.archiver).arg("-xz");
    // Listing is only meaningful relative to a resolved directory.
    if verbose && sync_dir.is_some() {
        cmd = cmd.arg("-v");
    }
    cmd = cmd.args(["-f", "-"]);
    match sync_dir {
        Some(dir) => cmd.current_dir(dir),
        None => cmd,
    }
}

/// Probe the destination bucket and create it when the probe fails.
pub fn ensure_bucket<E: Executor>(
    session: &Session<E>,
    tools: &Toolchain,
    destination: &BucketPath,
) -> Result<()> {
    let bucket = destination.bucket_url();
    let probe = Cmd::new(&tools.transport).args(["ls", "-b"]).arg(&bucket);
    if session.probe(&probe)? {
        return Ok(());
    }

    output::info(&format!("Bucket {} not found, creating it", bucket));
    let create = Cmd::new(&tools.transport).arg("mb").arg(&bucket);
    if !session.run(&create)? {
        return Err(SealtarError::BucketCreateFailed(bucket));
    }
    Ok(())
}

/// Run the stages; a stage that exits non-zero or never starts fails the transfer.
fn transfer<E: Executor>(session: &Session<E>, stages: &[Cmd], remote: &BucketPath) -> Result<()> {
    match session.pipeline(stages) {
        Ok(true) => Ok(()),
        Ok(false) => Err(SealtarError::TransferFailed(remote.to_string())),
        Err(e) => {
            tracing::error!(error = %e, remote = %remote, "pipeline could not run");
            Err(SealtarError::TransferFailed(remote.to_string()))
        }
    }
}

pub fn upload<E: Executor>(
    session: &Session<E>,
    config: &Config,
    invocation: &Invocation,
    patterns: &[String],
) -> Result<()> {
    let tools = &config.tools;
    let destination = &invocation.bucket_path;
    ensure_bucket(session, tools, destination)?;

    let stages = [
        archive_command(
            tools,
            invocation.sync_dir.as_deref(),
            patterns,
            &invocation.pass_through,
            &invocation.local_paths,
        ),
        seal_command(tools, &config.cert_path),
        put_command(tools, destination),
    ];
    tracing::info!(destination = %destination, "starting upload");
    transfer(session, &stages, destination)?;

    if !session.is_dry_run() {
        output::success(&format!("Uploaded to {}", destination));
    }
    Ok(())
}

pub fn download<E: Executor>(
    session: &Session<E>,
    config: &Config,
    invocation: &Invocation,
) -> Result<()> {
    let tools = &config.tools;
    let source = &invocation.bucket_path;

    let stages = [
        get_command(tools, source),
        open_command(tools, &config.key_path),
        extract_command(tools, invocation.sync_dir.as_deref(), session.is_verbose()),
    ];
    tracing::info!(source = %source, "starting download");
    transfer(session, &stages, source)?;

    if !session.is_dry_run() {
        let target = invocation
            .sync_dir
            .as_deref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| ".".to_string());
        output::success(&format!("Downloaded {} into {}", source, target));
    }
    Ok(())
}
