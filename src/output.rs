//! Operator-facing terminal output.
//!
//! Diagnostics go to stderr so they never mix with a stage's data stream.
//! Dry-run echoes go to stdout because they are the product of a dry run.

use colored::Colorize;

pub fn dry_run(line: &str) {
    println!("{} {}", "[dry-run]".cyan().bold(), line.cyan());
}

pub fn verbose(line: &str) {
    eprintln!("{} {}", "+".dimmed(), line.dimmed());
}

pub fn info(msg: &str) {
    eprintln!("{}", msg.cyan());
}

pub fn warn(msg: &str) {
    eprintln!("{}", format!("⚠ {}", msg).yellow());
}

pub fn success(msg: &str) {
    eprintln!("{}", format!("✓ {}", msg).green().bold());
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "error:".red().bold(), msg.red());
}
