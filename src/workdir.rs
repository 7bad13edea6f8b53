use std::io;
use std::path::Path;

use crate::error::{Result, SealtarError};
use crate::exec::{Executor, Session};
use crate::prompt::Prompt;

/// Make sure the sync directory exists, asking before creating it.
///
/// The archiver is later started with this directory as its working
/// directory, so relative paths in the archive resolve against it.
pub fn prepare<E: Executor, P: Prompt>(
    session: &Session<E>,
    prompt: &mut P,
    dir: &Path,
) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        return Err(SealtarError::DirectoryCreateFailed {
            path: dir.to_path_buf(),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "not a directory"),
        });
    }

    let question = format!("Directory {} does not exist. Create it?", dir.display());
    if !prompt.confirm(&question)? {
        return Err(SealtarError::Aborted(format!(
            "{} was not created",
            dir.display()
        )));
    }

    session
        .create_dir_all(dir)
        .map_err(|source| SealtarError::DirectoryCreateFailed {
            path: dir.to_path_buf(),
            source,
        })?;
    tracing::info!(dir = %dir.display(), "sync directory ready");
    Ok(())
}
