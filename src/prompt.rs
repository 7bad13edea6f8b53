use std::io;

use crate::error::{Result, SealtarError};

const PASSPHRASE_MIN_LENGTH: usize = 8;

/// Interactive questions asked of the operator.
#[cfg_attr(test, mockall::automock)]
pub trait Prompt {
    /// Ask a yes/no question; the default answer is no.
    fn confirm(&mut self, question: &str) -> Result<bool>;

    /// Read a new passphrase, entered twice.
    fn passphrase(&mut self) -> Result<String>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(question)
            .default(false)
            .interact()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()).into())
    }

    fn passphrase(&mut self) -> Result<String> {
        let passphrase = rpassword::prompt_password("Enter key passphrase: ")?;
        let verify = rpassword::prompt_password("Verify passphrase: ")?;

        if passphrase != verify {
            return Err(SealtarError::Aborted("passphrases do not match".into()));
        }
        if passphrase.len() < PASSPHRASE_MIN_LENGTH {
            return Err(SealtarError::Aborted(format!(
                "passphrase must be at least {} characters",
                PASSPHRASE_MIN_LENGTH
            )));
        }
        Ok(passphrase)
    }
}
