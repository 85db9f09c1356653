//! Values used when no configuration layer sets a field.

use camino::Utf8PathBuf;
use loom_engine::{DocxApplyMode, RiskLevel, ValidationPolicy};

use crate::logging::LogFormat;

/// Tracing filter used when `log_filter` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Artifacts land here, relative to the working directory.
pub const DEFAULT_ARTIFACTS_DIR: &str = ".loom";

/// Validation attempts per `apply` run.
pub const DEFAULT_MAX_VALIDATION_ROUNDS: u32 = 5;

/// [`DEFAULT_LOG_FILTER`] as an owned string for the derive.
#[must_use]
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Compact text logs.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Medium risk: count mismatches are flagged as collisions.
#[must_use]
pub const fn default_risk() -> RiskLevel {
    RiskLevel::Medium
}

/// Ask the user what to do about warnings.
#[must_use]
pub const fn default_on_error() -> ValidationPolicy {
    ValidationPolicy::Ask
}

/// Edit DOCX paragraphs in place.
#[must_use]
pub const fn default_apply_mode() -> DocxApplyMode {
    DocxApplyMode::InPlace
}

/// [`DEFAULT_ARTIFACTS_DIR`] as a path.
#[must_use]
pub fn default_artifacts_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_ARTIFACTS_DIR)
}
