//! Configuration loading helpers for the Loom CLI.
//!
//! Configuration flags are accepted before the subcommand, as in
//! `loom --risk low apply resume.tex --edits edits.json`. The splitter hands
//! those flags to `ortho_config` and leaves the rest for the command parser.

use std::ffi::{OsStr, OsString};

use loom_config::Config;
use ortho_config::OrthoConfig;

use crate::AppError;

/// Flags recognised by the configuration loader and whether each takes a
/// value.
///
/// Keep in sync with the fields of [`loom_config::Config`].
const CONFIG_CLI_FLAGS: &[(&str, bool)] = &[
    ("--config-path", true),
    ("--log-filter", true),
    ("--log-format", true),
    ("--risk", true),
    ("--on-error", true),
    ("--apply-mode", true),
    ("--preserve-structure", false),
    ("--artifacts-dir", true),
    ("--max-validation-rounds", true),
];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the filtered configuration arguments.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

fn process_config_flag(argument: &OsStr) -> FlagAction {
    let argument_text = argument.to_string_lossy();
    if !argument_text.starts_with("--") {
        return FlagAction::Skip;
    }
    let (flag, has_inline_value) = argument_text
        .split_once('=')
        .map_or((&*argument_text, false), |(flag, _)| (flag, true));

    CONFIG_CLI_FLAGS
        .iter()
        .find(|(known, _)| *known == flag)
        .map_or(FlagAction::Skip, |(_, takes_value)| FlagAction::Include {
            needs_value: *takes_value && !has_inline_value,
        })
}

pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_start: usize,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some(program) = args.first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut command_start = 1_usize;
    let mut pending_value = false;

    for argument in args.iter().skip(1) {
        if pending_value {
            pending_value = false;
        } else {
            match process_config_flag(argument) {
                FlagAction::Include { needs_value } => pending_value = needs_value,
                FlagAction::Skip => break,
            }
        }
        config_arguments.push(argument.clone());
        command_start += 1;
    }

    ConfigArgumentSplit {
        config_arguments,
        command_start,
    }
}

/// Builds the command parser's arguments: the program name followed by
/// everything after the configuration flags.
pub(crate) fn command_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    args.first()
        .into_iter()
        .chain(args.iter().skip(split.command_start))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn os_args(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case("--log-filter=debug", FlagAction::Include { needs_value: false })]
    #[case("--log-filter", FlagAction::Include { needs_value: true })]
    #[case("--preserve-structure", FlagAction::Include { needs_value: false })]
    #[case("apply", FlagAction::Skip)]
    #[case("--unknown", FlagAction::Skip)]
    fn flags_are_classified(#[case] argument: &str, #[case] expected: FlagAction) {
        assert_eq!(process_config_flag(OsStr::new(argument)), expected);
    }

    #[test]
    fn config_flags_before_the_command_are_split_off() {
        let args = os_args(&[
            "loom",
            "--risk",
            "low",
            "--preserve-structure",
            "--on-error=fail_hard",
            "apply",
            "cv.tex",
            "--edits",
            "edits.json",
        ]);
        let split = split_config_arguments(&args);
        assert_eq!(
            split.config_arguments,
            os_args(&[
                "loom",
                "--risk",
                "low",
                "--preserve-structure",
                "--on-error=fail_hard"
            ])
        );
        assert_eq!(
            command_arguments(&args, &split),
            os_args(&["loom", "apply", "cv.tex", "--edits", "edits.json"])
        );
    }

    #[test]
    fn flags_after_the_command_stay_with_the_command() {
        let args = os_args(&["loom", "lines", "--risk", "low"]);
        let split = split_config_arguments(&args);
        assert_eq!(split.config_arguments, os_args(&["loom"]));
        assert_eq!(split.command_start, 1);
    }

    #[test]
    fn empty_arguments_split_to_nothing() {
        let split = split_config_arguments(&[]);
        assert!(split.config_arguments.is_empty());
        assert_eq!(split.command_start, 0);
    }
}
