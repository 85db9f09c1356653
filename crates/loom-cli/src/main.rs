//! CLI entrypoint for the Loom line-edit tool.
//!
//! The binary delegates to [`loom_cli::run`], which loads configuration,
//! parses the command and drives the edit pipeline against the process's
//! standard streams.

use std::io::{self, IsTerminal};
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdin_is_terminal = io::stdin().is_terminal();
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    loom_cli::run(
        std::env::args_os(),
        &mut stdin,
        &mut stdout,
        &mut stderr,
        stdin_is_terminal,
    )
}
