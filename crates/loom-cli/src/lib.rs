//! Command-line runtime for the Loom line-edit tool.
//!
//! The module owns argument parsing, configuration bootstrapping and the
//! wiring between the standard streams and the edit pipeline in
//! `loom-engine`. The runtime can be driven from the binary entrypoint or
//! from tests with in-memory streams and a substitute configuration loader.

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

mod cli;
mod commands;
mod config;
mod errors;
mod prompt;
mod telemetry;


use cli::Cli;
use config::{command_arguments, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;

/// Bundles the IO streams provided to the CLI runtime.
///
/// Prompts for the interactive validation policies read from `stdin` and
/// write to `stderr`, so `stdout` carries only command output.
pub(crate) struct IoStreams<'a, R: BufRead, W: Write, E: Write> {
    pub(crate) stdin: &'a mut R,
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
    pub(crate) stdin_is_terminal: bool,
}

impl<'a, R: BufRead, W: Write, E: Write> IoStreams<'a, R, W, E> {
    pub(crate) const fn new(
        stdin: &'a mut R,
        stdout: &'a mut W,
        stderr: &'a mut E,
        stdin_is_terminal: bool,
    ) -> Self {
        Self {
            stdin,
            stdout,
            stderr,
            stdin_is_terminal,
        }
    }
}

struct CliRunner<'a, 'io, R: BufRead, W: Write, E: Write, L: ConfigLoader> {
    io: &'a mut IoStreams<'io, R, W, E>,
    loader: &'a L,
}

impl<'a, 'io, R, W, E, L> CliRunner<'a, 'io, R, W, E, L>
where
    R: BufRead,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    const fn new(io: &'a mut IoStreams<'io, R, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);
        let cli_arguments = command_arguments(&args, &split);

        let cli = match Cli::try_parse_from(cli_arguments) {
            Ok(cli) => cli,
            Err(error) => return self.report_usage(error),
        };

        let result = self
            .loader
            .load(&split.config_arguments)
            .and_then(|config| {
                telemetry::initialise(&config)?;
                commands::execute(cli.command, &config, self.io)
            });

        match result {
            Ok(exit_code) => exit_code,
            Err(error) => {
                tracing::debug!(target: "loom::cli", %error, "command failed");
                let _ = writeln!(self.io.stderr, "{error}");
                ExitCode::FAILURE
            }
        }
    }

    /// Help and version requests go to stdout and succeed; genuine usage
    /// errors go to stderr.
    fn report_usage(&mut self, error: clap::Error) -> ExitCode {
        match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = write!(self.io.stdout, "{error}");
                ExitCode::SUCCESS
            }
            _ => {
                let _ = writeln!(self.io.stderr, "{}", AppError::CliUsage(error));
                ExitCode::FAILURE
            }
        }
    }
}

/// Runs the CLI using the provided arguments and IO handles.
///
/// `stdin_is_terminal` decides whether the interactive validation policies
/// may prompt on `stdin`.
#[must_use]
pub fn run<I, R, W, E>(
    args: I,
    stdin: &mut R,
    stdout: &mut W,
    stderr: &mut E,
    stdin_is_terminal: bool,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdin, stdout, stderr, stdin_is_terminal);
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
#[must_use]
pub(crate) fn run_with_loader<I, R, W, E, L>(
    args: I,
    io: &mut IoStreams<'_, R, W, E>,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(io, loader).run(args)
}
