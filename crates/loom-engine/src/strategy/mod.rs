//! Policy-driven handling of validation warnings.
//!
//! When an edit batch produces warnings, a [`ValidationPolicy`] decides what
//! happens next: ask the user, retry, hand over for manual editing, switch
//! model, or abort softly or hard. User interaction goes through the
//! [`ValidationHost`] trait so the engine never touches a terminal itself.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// What to do when validation produces warnings.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ValidationPolicy {
    /// Present the warnings and let the user pick another policy.
    #[default]
    Ask,
    /// Signal the caller to regenerate and validate again.
    Retry,
    /// Hand control to the user to fix the edits by hand.
    Manual,
    /// Stop, leaving artifacts in place for inspection.
    #[serde(alias = "soft")]
    #[strum(to_string = "fail_soft", serialize = "soft")]
    FailSoft,
    /// Stop and remove artifacts.
    #[serde(alias = "hard")]
    #[strum(to_string = "fail_hard", serialize = "hard")]
    FailHard,
    /// Retry with a different model chosen by the user.
    #[serde(alias = "change_model")]
    #[strum(to_string = "model_retry", serialize = "change_model")]
    ModelRetry,
}

impl ValidationPolicy {
    /// Maps an interactive answer such as `s`, `hard` or `c` to a policy.
    ///
    /// Returns `None` for anything unrecognised. `Ask` is never returned.
    #[must_use]
    pub fn from_choice(answer: &str) -> Option<Self> {
        match answer.trim().to_ascii_lowercase().as_str() {
            "s" | "soft" | "fail:soft" | "fail_soft" => Some(Self::FailSoft),
            "h" | "hard" | "fail:hard" | "fail_hard" => Some(Self::FailHard),
            "m" | "manual" => Some(Self::Manual),
            "r" | "retry" => Some(Self::Retry),
            "c" | "change" | "change-model" | "change_model" | "model" => Some(Self::ModelRetry),
            _ => None,
        }
    }
}

/// How hard a failed validation aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Leave artifacts in place; the run still exits successfully.
    Soft,
    /// Remove artifacts and exit with failure.
    Hard,
}

/// Payload carried by a [`ValidationOutcome`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutcomeValue {
    /// Nothing to carry.
    #[default]
    None,
    /// Warnings to feed into the next attempt.
    Warnings(Vec<String>),
    /// Model chosen for the next attempt.
    Model(String),
}

/// Result of handling one round of warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Whether validation passed.
    pub success: bool,
    /// Data for the next step.
    pub value: OutcomeValue,
    /// Whether the caller should regenerate and validate again.
    pub should_continue: bool,
}

impl ValidationOutcome {
    /// Validation passed.
    #[must_use]
    pub const fn passed() -> Self {
        Self {
            success: true,
            value: OutcomeValue::None,
            should_continue: false,
        }
    }

    fn retry(warnings: &[String]) -> Self {
        Self {
            success: false,
            value: OutcomeValue::Warnings(warnings.to_vec()),
            should_continue: true,
        }
    }

    const fn manual() -> Self {
        Self {
            success: false,
            value: OutcomeValue::None,
            should_continue: false,
        }
    }
}

/// Errors ending a validation flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// An interactive policy ran without a terminal.
    #[error("{mode} not available - non-interactive terminal")]
    NotInteractive {
        /// Name of the mode that needed a terminal.
        mode: &'static str,
        /// Warnings that triggered the policy.
        warnings: Vec<String>,
    },

    /// A fail-soft or fail-hard policy stopped the run.
    #[error("validation failed ({severity})")]
    Aborted {
        /// How hard the failure is.
        severity: Severity,
        /// Warnings that triggered the policy.
        warnings: Vec<String>,
    },

    /// Warnings persisted past the round limit.
    #[error("validation still failing after {rounds} round(s)")]
    Exhausted {
        /// Number of validation rounds run.
        rounds: u32,
        /// Warnings from the last round.
        warnings: Vec<String>,
    },
}

impl ValidationError {
    /// Whether the run may still exit successfully.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Aborted {
                severity: Severity::Soft,
                ..
            }
        )
    }

    /// Warnings attached to the error.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        match self {
            Self::NotInteractive { warnings, .. }
            | Self::Aborted { warnings, .. }
            | Self::Exhausted { warnings, .. } => warnings,
        }
    }
}

/// User interaction needed by the interactive policies.
pub trait ValidationHost {
    /// Whether a user can answer prompts.
    fn is_interactive(&self) -> bool;

    /// Shows the warnings to the user.
    fn present(&mut self, warnings: &[String]);

    /// Asks for the next policy. `None` means the answer was not understood
    /// and the question is asked again.
    fn choose_policy(&mut self, warnings: &[String]) -> Option<ValidationPolicy>;

    /// Asks for a model to retry with. `None` keeps the current model.
    fn choose_model(&mut self) -> Option<String>;
}

fn require_interactive<H: ValidationHost + ?Sized>(
    host: &H,
    mode: &'static str,
    warnings: &[String],
) -> Result<(), ValidationError> {
    if host.is_interactive() {
        Ok(())
    } else {
        Err(ValidationError::NotInteractive {
            mode,
            warnings: warnings.to_vec(),
        })
    }
}

/// Applies `policy` to one round of warnings.
///
/// An empty warning list always succeeds.
///
/// # Errors
///
/// Returns [`ValidationError::NotInteractive`] when an interactive policy
/// runs without a terminal, and [`ValidationError::Aborted`] for the fail
/// policies.
pub fn handle<H: ValidationHost + ?Sized>(
    policy: ValidationPolicy,
    warnings: &[String],
    host: &mut H,
) -> Result<ValidationOutcome, ValidationError> {
    if warnings.is_empty() {
        return Ok(ValidationOutcome::passed());
    }
    info!(
        target: "loom::strategy",
        %policy,
        warnings = warnings.len(),
        "handling validation warnings"
    );
    match policy {
        ValidationPolicy::Ask => {
            require_interactive(host, "Ask mode", warnings)?;
            host.present(warnings);
            loop {
                match host.choose_policy(warnings) {
                    Some(ValidationPolicy::Ask) | None => {
                        debug!(target: "loom::strategy", "invalid policy choice");
                    }
                    Some(choice) => return handle(choice, warnings, host),
                }
            }
        }
        ValidationPolicy::Retry => Ok(ValidationOutcome::retry(warnings)),
        ValidationPolicy::Manual => {
            require_interactive(host, "Manual mode", warnings)?;
            Ok(ValidationOutcome::manual())
        }
        ValidationPolicy::FailSoft => Err(ValidationError::Aborted {
            severity: Severity::Soft,
            warnings: warnings.to_vec(),
        }),
        ValidationPolicy::FailHard => Err(ValidationError::Aborted {
            severity: Severity::Hard,
            warnings: warnings.to_vec(),
        }),
        ValidationPolicy::ModelRetry => {
            require_interactive(host, "Model change", warnings)?;
            Ok(host.choose_model().map_or_else(
                || ValidationOutcome::retry(warnings),
                |model| ValidationOutcome {
                    success: false,
                    value: OutcomeValue::Model(model),
                    should_continue: true,
                },
            ))
        }
    }
}

/// How a [`ValidationLoop`] finished without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Validation passed after the given number of rounds.
    Passed {
        /// Rounds run, including the passing one.
        rounds: u32,
    },
    /// The user must fix the edits by hand; no hook was available to wait
    /// for them.
    ManualHandoff {
        /// Warnings from the last round.
        warnings: Vec<String>,
    },
}

type RegenerateHook<'a> = Box<dyn FnMut(&[String], Option<&str>) + 'a>;
type ManualEditHook<'a> = Box<dyn FnMut(&[String]) + 'a>;

/// Optional callbacks the loop uses between rounds.
#[derive(Default)]
pub struct LoopHooks<'a> {
    regenerate: Option<RegenerateHook<'a>>,
    manual_edit: Option<ManualEditHook<'a>>,
}

impl<'a> LoopHooks<'a> {
    /// No hooks: retries fall back to manual handoff.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the prior warnings and an optional new model before a
    /// retry round.
    #[must_use]
    pub fn with_regenerate(mut self, hook: impl FnMut(&[String], Option<&str>) + 'a) -> Self {
        self.regenerate = Some(Box::new(hook));
        self
    }

    /// Called with the prior warnings; returns once the user has edited
    /// the batch.
    #[must_use]
    pub fn with_manual_edit(mut self, hook: impl FnMut(&[String]) + 'a) -> Self {
        self.manual_edit = Some(Box::new(hook));
        self
    }
}

/// Drives validate, handle and regenerate rounds until a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLoop {
    max_rounds: u32,
}

impl ValidationLoop {
    /// Creates a loop that gives up after `max_rounds` failing rounds. A
    /// limit of zero is treated as one.
    #[must_use]
    pub const fn new(max_rounds: u32) -> Self {
        Self {
            max_rounds: if max_rounds == 0 { 1 } else { max_rounds },
        }
    }

    /// Runs the loop.
    ///
    /// # Errors
    ///
    /// Propagates [`handle`] errors, and returns
    /// [`ValidationError::Exhausted`] when the policy asks for another round
    /// after the last allowed one.
    pub fn run<H: ValidationHost + ?Sized>(
        &self,
        policy: ValidationPolicy,
        host: &mut H,
        mut validate: impl FnMut() -> Vec<String>,
        hooks: &mut LoopHooks<'_>,
    ) -> Result<Resolution, ValidationError> {
        let mut rounds = 0_u32;
        loop {
            rounds += 1;
            let warnings = validate();
            if warnings.is_empty() {
                debug!(target: "loom::strategy", rounds, "validation passed");
                return Ok(Resolution::Passed { rounds });
            }

            let outcome = handle(policy, &warnings, host)?;
            if rounds >= self.max_rounds {
                warn!(target: "loom::strategy", rounds, "validation rounds exhausted");
                return Err(ValidationError::Exhausted { rounds, warnings });
            }
            if outcome.should_continue {
                if let Some(regenerate) = hooks.regenerate.as_mut() {
                    let model = match &outcome.value {
                        OutcomeValue::Model(model) => Some(model.as_str()),
                        OutcomeValue::None | OutcomeValue::Warnings(_) => None,
                    };
                    regenerate(&warnings, model);
                    continue;
                }
                debug!(target: "loom::strategy", "no regenerate hook; falling back to manual");
            }
            match hooks.manual_edit.as_mut() {
                Some(manual_edit) => manual_edit(&warnings),
                None => return Ok(Resolution::ManualHandoff { warnings }),
            }
        }
    }
}

/// Files written during an apply run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifacts {
    /// The edit batch JSON.
    pub edits: PathBuf,
    /// Unified diff of the line maps.
    pub diff: PathBuf,
    /// Human-readable edit plan.
    pub plan: PathBuf,
    /// Validation and filter warnings.
    pub warnings: PathBuf,
}

impl RunArtifacts {
    /// Standard artifact names inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            edits: dir.join("edits.json"),
            diff: dir.join("diff.patch"),
            plan: dir.join("plan.txt"),
            warnings: dir.join("warnings.txt"),
        }
    }

    /// Every artifact path.
    #[must_use]
    pub fn paths(&self) -> [&Path; 4] {
        [
            self.edits.as_path(),
            self.diff.as_path(),
            self.plan.as_path(),
            self.warnings.as_path(),
        ]
    }

    /// Deletes the artifacts that exist and returns their paths.
    ///
    /// Files that cannot be removed are logged and skipped.
    #[must_use = "the deleted paths should be reported"]
    pub fn cleanup(&self) -> Vec<PathBuf> {
        self.paths()
            .into_iter()
            .filter(|path| path.exists())
            .filter_map(|path| match fs::remove_file(path) {
                Ok(()) => Some(path.to_path_buf()),
                Err(error) => {
                    warn!(target: "loom::strategy", path = %path.display(), %error, "could not delete artifact");
                    None
                }
            })
            .collect()
    }

    /// Writes one artifact, creating its directory.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub fn write(path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    }
}

#[cfg(test)]
mod tests;
