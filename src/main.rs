use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;
use tracing::Level;

mod cli;
mod config;
mod credentials;
mod error;
mod exec;
mod ignore;
mod invocation;
mod output;
mod pipeline;
mod precheck;
mod prompt;
#[cfg(test)]
mod testing;
mod workdir;

use error::SealtarError;

fn main() -> ExitCode {
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(&err.to_string());
            if let Some(SealtarError::Usage(_)) = err.downcast_ref::<SealtarError>() {
                eprintln!();
                eprintln!("{}", cli::usage());
            }
            tracing::debug!(error = ?err, "exiting with failure");
            ExitCode::from(1)
        }
    }
}
