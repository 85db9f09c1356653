//! Layered configuration for the Loom command.
//!
//! [`Config`] is loaded through `ortho_config`, which merges, in increasing
//! precedence:
//!
//! 1. the built-in defaults in [`defaults`];
//! 2. a `.loom.toml` file, or the file named by `--config-path` /
//!    `LOOM_CONFIG_PATH`;
//! 3. `LOOM_*` environment variables such as `LOOM_RISK=low`;
//! 4. command-line flags such as `--on-error fail_hard`.
//!
//! Loading fails fast: every malformed layer is reported through a single
//! aggregated [`ortho_config::OrthoError`].

mod defaults;
mod logging;

use camino::{Utf8Path, Utf8PathBuf};
use loom_engine::{DocxApplyMode, ReadMode, RiskLevel, ValidationPolicy};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use self::defaults::{
    DEFAULT_ARTIFACTS_DIR, DEFAULT_LOG_FILTER, DEFAULT_MAX_VALIDATION_ROUNDS, default_apply_mode,
    default_artifacts_dir, default_log_filter, default_log_format, default_on_error,
    default_risk,
};
pub use self::logging::LogFormat;

/// Runtime configuration shared by every Loom command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "LOOM")]
pub struct Config {
    /// Tracing filter expression, for example `loom::filter=debug`.
    #[ortho_config(default = defaults::default_log_filter())]
    log_filter: String,
    /// Log output format.
    #[ortho_config(default = defaults::default_log_format())]
    log_format: LogFormat,
    /// Strictness tier for edit validation.
    #[ortho_config(default = defaults::default_risk())]
    risk: RiskLevel,
    /// What to do when validation produces warnings.
    #[ortho_config(default = defaults::default_on_error())]
    on_error: ValidationPolicy,
    /// How edited DOCX packages are written back.
    #[ortho_config(default = defaults::default_apply_mode())]
    apply_mode: DocxApplyMode,
    /// Keep blank lines and physical numbering when reading text formats.
    #[ortho_config(default = false)]
    preserve_structure: bool,
    /// Directory receiving edits, diff, plan and warning artifacts.
    #[ortho_config(default = defaults::default_artifacts_dir())]
    artifacts_dir: Utf8PathBuf,
    /// Validation rounds attempted before giving up.
    #[ortho_config(default = defaults::DEFAULT_MAX_VALIDATION_ROUNDS)]
    max_validation_rounds: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            log_format: default_log_format(),
            risk: default_risk(),
            on_error: default_on_error(),
            apply_mode: default_apply_mode(),
            preserve_structure: false,
            artifacts_dir: default_artifacts_dir(),
            max_validation_rounds: DEFAULT_MAX_VALIDATION_ROUNDS,
        }
    }
}

impl Config {
    /// Returns the tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Returns the log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the validation risk tier.
    #[must_use]
    pub const fn risk(&self) -> RiskLevel {
        self.risk
    }

    /// Returns the policy applied to validation warnings.
    #[must_use]
    pub const fn on_error(&self) -> ValidationPolicy {
        self.on_error
    }

    /// Returns the DOCX write-back mode.
    #[must_use]
    pub const fn apply_mode(&self) -> DocxApplyMode {
        self.apply_mode
    }

    /// Returns whether text formats keep their physical line numbering.
    #[must_use]
    pub const fn preserve_structure(&self) -> bool {
        self.preserve_structure
    }

    /// Returns the read mode implied by [`Self::preserve_structure`].
    #[must_use]
    pub const fn read_mode(&self) -> ReadMode {
        ReadMode::from_preserve_flag(self.preserve_structure)
    }

    /// Returns the artifacts directory.
    #[must_use]
    pub fn artifacts_dir(&self) -> &Utf8Path {
        &self.artifacts_dir
    }

    /// Returns the validation round limit, never less than one.
    #[must_use]
    pub const fn max_validation_rounds(&self) -> u32 {
        if self.max_validation_rounds == 0 {
            1
        } else {
            self.max_validation_rounds
        }
    }
}
