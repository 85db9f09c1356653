//! Error types for the CLI runtime.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use loom_engine::{DocumentError, EditBatchError, EditError, TemplateError};
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    EditBatch(#[from] EditBatchError),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error("failed to read edits from {}: {source}", path.display())]
    ReadEdits { path: PathBuf, source: io::Error },
    #[error("failed to parse edits in {}: {source}", path.display())]
    ParseEdits {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write artifact {}: {source}", path.display())]
    WriteArtifact { path: PathBuf, source: io::Error },
    #[error("failed to serialise sections: {0}")]
    SerialiseSections(serde_json::Error),
    #[error("failed to write output: {0}")]
    WriteOutput(#[from] io::Error),
    #[error("edited document failed output checks:\n{0}")]
    OutputCheck(String),
}
