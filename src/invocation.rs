//! Argument classification.
//!
//! Turns the parsed command line into an [`Invocation`]: which direction the
//! data flows, where it lives in the object store, and which local paths are
//! involved. All of this happens before any external command runs.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::error::{Result, SealtarError};

pub const SCHEME: &str = "gs://";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

/// An object location, `gs://BUCKET/OBJECT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPath {
    bucket: String,
    object: String,
}

impl BucketPath {
    pub fn parse(raw: &str) -> Result<Self> {
        let rest = raw
            .strip_prefix(SCHEME)
            .ok_or_else(|| SealtarError::Usage(format!("{} does not start with {}", raw, SCHEME)))?;
        let (bucket, object) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(SealtarError::Usage(format!("missing bucket name in {}", raw)));
        }
        if object.is_empty() {
            return Err(SealtarError::Usage(format!("missing object name in {}", raw)));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            object: object.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    /// `gs://BUCKET`, the form bucket-level commands expect.
    pub fn bucket_url(&self) -> String {
        format!("{}{}", SCHEME, self.bucket())
    }
}

impl fmt::Display for BucketPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", SCHEME, self.bucket(), self.object())
    }
}

pub fn is_remote(arg: &OsStr) -> bool {
    arg.to_str().map_or(false, |s| s.starts_with(SCHEME))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub direction: Direction,
    pub bucket_path: BucketPath,
    /// Upload: the items to archive. Download: exactly one extraction directory.
    pub local_paths: Vec<PathBuf>,
    pub pass_through: Vec<OsString>,
    /// Working directory for the archiver, when one was resolved.
    pub sync_dir: Option<PathBuf>,
    pub verbose: bool,
    pub dry_run: bool,
}

/// Classify the command line. Relative paths are checked against `cwd`.
pub fn classify(cli: &Cli, cwd: &Path) -> Result<Invocation> {
    let first = cli
        .targets
        .first()
        .ok_or_else(|| SealtarError::Usage("missing PATH and destination".into()))?;

    let (direction, bucket_path, local_paths, sync_dir) = if is_remote(first) {
        let (bucket_path, dir) = classify_download(cli, cwd)?;
        (Direction::Download, bucket_path, vec![dir.clone()], Some(dir))
    } else {
        let (bucket_path, paths, sync_dir) = classify_upload(cli, cwd)?;
        (Direction::Upload, bucket_path, paths, sync_dir)
    };

    let invocation = Invocation {
        direction,
        bucket_path,
        local_paths,
        pass_through: cli.tar_args.clone(),
        sync_dir,
        verbose: cli.verbose,
        dry_run: cli.dry_run,
    };
    tracing::debug!(?invocation, "classified arguments");
    Ok(invocation)
}

fn classify_download(cli: &Cli, cwd: &Path) -> Result<(BucketPath, PathBuf)> {
    if !cli.tar_args.is_empty() {
        return Err(SealtarError::Usage(
            "archiver arguments after `--` are only accepted when uploading".into(),
        ));
    }

    let source = BucketPath::parse(&cli.targets[0].to_string_lossy())?;
    let dir = match &cli.targets[1..] {
        [] => {
            return Err(SealtarError::Usage(
                "missing local directory to extract into".into(),
            ))
        }
        [dir] if is_remote(dir) => {
            return Err(SealtarError::Usage(format!(
                "download target must be a local directory, not {}",
                dir.to_string_lossy()
            )))
        }
        [dir] => cwd.join(dir),
        [_, extra, ..] => {
            return Err(SealtarError::ExtraArgument(
                extra.to_string_lossy().into_owned(),
            ))
        }
    };
    Ok((source, dir))
}

fn classify_upload(cli: &Cli, cwd: &Path) -> Result<(BucketPath, Vec<PathBuf>, Option<PathBuf>)> {
    let mut destination = None;
    let mut paths = Vec::new();
    for arg in &cli.targets {
        if is_remote(arg) {
            if destination.is_some() {
                return Err(SealtarError::Usage(
                    "only one gs:// destination may be given".into(),
                ));
            }
            destination = Some(BucketPath::parse(&arg.to_string_lossy())?);
        } else {
            paths.push(PathBuf::from(arg));
        }
    }

    let destination = destination
        .ok_or_else(|| SealtarError::Usage(format!("missing {}BUCKET/OBJECT destination", SCHEME)))?;
    if paths.is_empty() {
        return Err(SealtarError::Usage("missing local PATH to upload".into()));
    }

    if paths.len() > 1 {
        if let Some(absolute) = paths.iter().find(|p| p.is_absolute()) {
            return Err(SealtarError::RelativePathRequired(absolute.clone()));
        }
    }
    for path in &paths {
        // Follows symlinks, so a dangling link counts as missing.
        if !matches!(cwd.join(path).try_exists(), Ok(true)) {
            return Err(SealtarError::PathNotFound(path.clone()));
        }
    }

    let mut sync_dir = None;
    if let [only] = paths.as_slice() {
        if only.is_absolute() {
            // `/data/x/..` has no final name until it is resolved.
            let resolved = match only.file_name() {
                Some(_) => only.clone(),
                None => only
                    .canonicalize()
                    .map_err(|_| SealtarError::PathNotFound(only.clone()))?,
            };
            if let (Some(parent), Some(name)) = (resolved.parent(), resolved.file_name()) {
                sync_dir = Some(parent.to_path_buf());
                paths = vec![PathBuf::from(name)];
            }
        }
    }
    Ok((destination, paths, sync_dir))
}
