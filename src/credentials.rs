//! First-run key and certificate bootstrap.
//!
//! Archives are sealed to a self-signed certificate and opened with the
//! matching private key. Both live in user-owned files; when either is
//! missing the operator is offered a freshly generated pair. The tool keeps
//! no other copy of this material, so losing either file (or the key's
//! passphrase) makes every archive sealed to it unrecoverable.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Result, SealtarError};
use crate::exec::{Cmd, Executor, Session};
use crate::output;
use crate::prompt::Prompt;

const KEY_SPEC: &str = "rsa:4096";
const CERT_DAYS: &str = "36500";
const SUBJECT: &str = "/C=XX/ST=None/L=None/O=sealtar/CN=sealtar";
const PASSPHRASE_ENV: &str = "SEALTAR_KEY_PASSPHRASE";

/// Make sure a key and certificate exist, offering to create them if not.
pub fn ensure<E: Executor, P: Prompt>(
    session: &Session<E>,
    prompt: &mut P,
    config: &Config,
) -> Result<()> {
    let key = &config.key_path;
    let cert = &config.cert_path;
    if key.exists() && cert.exists() {
        tracing::debug!(key = %key.display(), cert = %cert.display(), "credentials present");
        return Ok(());
    }

    output::warn(&format!(
        "No key/certificate pair found at {} and {}",
        key.display(),
        cert.display()
    ));
    if key.exists() || cert.exists() {
        output::warn("The existing half of the pair will be replaced");
    }
    if !prompt.confirm("Generate a new RSA key and self-signed certificate now?")? {
        return Err(SealtarError::Aborted(
            "a key and certificate are required".into(),
        ));
    }
    let passphrase = if prompt.confirm("Protect the private key with a passphrase?")? {
        Some(prompt.passphrase()?)
    } else {
        None
    };

    // Only files this run creates may be cleaned up afterwards.
    let preexisting: Vec<PathBuf> = [key, cert]
        .into_iter()
        .filter(|p| p.exists())
        .cloned()
        .collect();

    let _umask = UmaskGuard::restrict();
    let csr = csr_path(key);
    let result = generate(session, config, &csr, passphrase.as_deref());

    if !session.is_dry_run() {
        remove_if_present(&csr);
        if result.is_err() {
            for path in [key, cert] {
                if preexisting.contains(path) {
                    tracing::warn!(path = %path.display(), "keeping file that predates the failed bootstrap");
                } else {
                    remove_if_present(path);
                }
            }
        }
    }
    result?;

    if !session.is_dry_run() {
        output::success("Created new key pair");
        eprintln!("  private key: {}", key.display());
        eprintln!("  certificate: {}", cert.display());
        output::warn(
            "Back these files up. Without them (and any passphrase) uploaded archives cannot be decrypted.",
        );
    }
    Ok(())
}

fn csr_path(key: &Path) -> PathBuf {
    key.with_extension("csr")
}

fn generate<E: Executor>(
    session: &Session<E>,
    config: &Config,
    csr: &Path,
    passphrase: Option<&str>,
) -> Result<()> {
    let openssl = &config.tools.cipher;
    for file in [&config.key_path, &config.cert_path] {
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            session.create_dir_all(parent)?;
        }
    }

    let mut request = Cmd::new(openssl)
        .args(["req", "-new", "-newkey", KEY_SPEC, "-subj", SUBJECT])
        .arg("-keyout")
        .arg(&config.key_path)
        .arg("-out")
        .arg(csr);
    request = match passphrase {
        Some(p) => request
            .arg("-passout")
            .arg(format!("env:{}", PASSPHRASE_ENV))
            .env(PASSPHRASE_ENV, p),
        None => request.arg("-nodes"),
    };
    if !session.run(&request)? {
        return Err(SealtarError::CsrGenerationFailed(csr.to_path_buf()));
    }

    let mut sign = Cmd::new(openssl)
        .args(["x509", "-req", "-days", CERT_DAYS])
        .arg("-in")
        .arg(csr)
        .arg("-signkey")
        .arg(&config.key_path)
        .arg("-out")
        .arg(&config.cert_path);
    if let Some(p) = passphrase {
        sign = sign
            .arg("-passin")
            .arg(format!("env:{}", PASSPHRASE_ENV))
            .env(PASSPHRASE_ENV, p);
    }
    if !session.run(&sign)? {
        return Err(SealtarError::CertSigningFailed(config.cert_path.clone()));
    }
    Ok(())
}

fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove"),
    }
}

/// Owner-only file creation mask for as long as the guard lives.
#[cfg(unix)]
struct UmaskGuard {
    previous: libc::mode_t,
}

#[cfg(unix)]
impl UmaskGuard {
    fn restrict() -> Self {
        // SAFETY: umask only swaps the process file-creation mask.
        let previous = unsafe { libc::umask(0o077) };
        Self { previous }
    }
}

#[cfg(unix)]
impl Drop for UmaskGuard {
    fn drop(&mut self) {
        // SAFETY: restores the mask saved in `restrict`.
        unsafe {
            libc::umask(self.previous);
        }
    }
}

#[cfg(not(unix))]
struct UmaskGuard;

#[cfg(not(unix))]
impl UmaskGuard {
    fn restrict() -> Self {
        UmaskGuard
    }
}
