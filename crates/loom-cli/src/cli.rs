//! CLI argument definitions for the Loom command.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Command-line interface for the Loom line-edit tool.
#[derive(Parser, Debug)]
#[command(name = "loom", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// The operation to run.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Loom subcommands.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Prints the numbered line map of a document.
    Lines {
        /// DOCX, LaTeX or Typst document.
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,
    },
    /// Prints detected sections as JSON.
    Sections {
        /// DOCX, LaTeX or Typst document.
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,
    },
    /// Validates, filters and applies an edit batch.
    Apply(ApplyArgs),
}

/// Arguments for `loom apply`.
#[derive(Args, Debug, Clone)]
pub(crate) struct ApplyArgs {
    /// DOCX, LaTeX or Typst document to edit.
    #[arg(value_name = "DOCUMENT")]
    pub(crate) document: PathBuf,
    /// JSON edit batch.
    #[arg(long, value_name = "FILE")]
    pub(crate) edits: PathBuf,
    /// Where to write the edited document. Defaults to
    /// `<stem>.edited.<ext>` next to the input.
    #[arg(long, short, value_name = "FILE")]
    pub(crate) output: Option<PathBuf>,
    /// Prints the plan and diff without writing the document.
    #[arg(long)]
    pub(crate) dry_run: bool,
}
