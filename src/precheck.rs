use crate::config::Toolchain;
use crate::error::{Result, SealtarError};
use crate::exec::{Cmd, Executor, Session};

/// Fail fast when any of the three external programs is absent.
pub fn verify_toolchain<E: Executor>(session: &Session<E>, tools: &Toolchain) -> Result<()> {
    for program in tools.all() {
        if session.locate(program).is_none() {
            return Err(SealtarError::ToolMissing(program.to_string()));
        }
    }
    Ok(())
}

/// A listing call against the object store must succeed before any data moves.
pub fn verify_identity<E: Executor>(session: &Session<E>, tools: &Toolchain) -> Result<()> {
    let probe = Cmd::new(&tools.transport).arg("ls");
    if !session.probe(&probe)? {
        return Err(SealtarError::Credential(probe.to_string()));
    }
    tracing::info!("object store credentials verified");
    Ok(())
}
