//! Command execution for `loom lines`, `loom sections` and `loom apply`.

use std::cell::RefCell;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use loom_config::Config;
use loom_engine::strategy::{LoopHooks, Resolution, RunArtifacts, Severity, ValidationLoop};
use loom_engine::{
    DescriptorCache, DocumentFormat, EditBatch, LineMap, LoadedDocument, ValidationError,
    build_target, diff_lines, plan_edits, validate_edits, validate_output,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::cli::{ApplyArgs, CliCommand};
use crate::prompt::{Prompt, SharedHost};
use crate::{AppError, IoStreams};

pub(crate) fn execute<R, W, E>(
    command: CliCommand,
    config: &Config,
    io: &mut IoStreams<'_, R, W, E>,
) -> Result<ExitCode, AppError>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    match command {
        CliCommand::Lines { document } => {
            let loaded = load(&document, config)?;
            write!(io.stdout, "{}", loaded.lines.render_numbered())?;
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Sections { document } => {
            let loaded = load(&document, config)?;
            let context = loaded
                .format
                .build_context(&mut DescriptorCache::new(), &loaded)?;
            let payload = serde_json::to_string_pretty(&context.analysis.to_payload())
                .map_err(AppError::SerialiseSections)?;
            writeln!(io.stdout, "{payload}")?;
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Apply(args) => apply(&args, config, io),
    }
}

fn load(document: &Path, config: &Config) -> Result<LoadedDocument, AppError> {
    let format = DocumentFormat::from_path(document)?;
    let loaded = format.read(document, config.read_mode())?;
    debug!(
        target: "loom::cli",
        path = %document.display(),
        %format,
        lines = loaded.lines.len(),
        "document loaded"
    );
    Ok(loaded)
}

fn read_edits(path: &Path) -> Result<(String, Value), AppError> {
    let text = fs::read_to_string(path).map_err(|source| AppError::ReadEdits {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_json::from_str(&text).map_err(|source| AppError::ParseEdits {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((text, value))
}

fn write_artifact(path: &Path, contents: &str) -> Result<(), AppError> {
    RunArtifacts::write(path, contents).map_err(|source| AppError::WriteArtifact {
        path: path.to_path_buf(),
        source,
    })
}

fn join_lines(entries: &[String]) -> String {
    entries.iter().map(|entry| format!("{entry}\n")).collect()
}

/// `resume.tex` becomes `resume.edited.tex` in the same directory.
fn default_output(document: &Path) -> PathBuf {
    let stem = document
        .file_stem()
        .map_or_else(|| "document".to_owned(), |stem| stem.to_string_lossy().into_owned());
    let name = document.extension().map_or_else(
        || format!("{stem}.edited"),
        |extension| format!("{stem}.edited.{}", extension.to_string_lossy()),
    );
    document.with_file_name(name)
}

fn apply<R, W, E>(
    args: &ApplyArgs,
    config: &Config,
    io: &mut IoStreams<'_, R, W, E>,
) -> Result<ExitCode, AppError>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let loaded = load(&args.document, config)?;
    let format = loaded.format;
    let context = format.build_context(&mut DescriptorCache::new(), &loaded)?;

    let artifacts = RunArtifacts::in_dir(config.artifacts_dir().as_std_path());
    let (edits_text, _) = read_edits(&args.edits)?;
    write_artifact(&artifacts.edits, &edits_text)?;

    if let Some(exit_code) = run_validation(&loaded.lines, config, &artifacts, io)? {
        return Ok(exit_code);
    }

    let (_, value) = read_edits(&artifacts.edits)?;
    let (batch, mut notes) = EditBatch::from_value(&value)?;
    let filtered = format.filter_edits(
        &batch,
        &loaded.lines,
        context.descriptor.as_deref(),
        &context.analysis.frozen_ranges,
    );
    notes.extend(filtered.notes);
    let target = build_target(&loaded.lines, &filtered.batch)?;

    write_artifact(&artifacts.diff, &diff_lines(&loaded.lines, &target))?;
    write_artifact(&artifacts.warnings, &join_lines(&notes))?;
    for note in &notes {
        writeln!(io.stderr, "note: {note}")?;
    }

    let require_markers = loaded
        .text()
        .is_some_and(|text| text.contains(r"\begin{document}"));
    let findings = validate_output(format, &target.to_text(), require_markers);
    if !findings.is_empty() {
        return Err(AppError::OutputCheck(findings.join("\n")));
    }

    if args.dry_run {
        let plan = plan_edits(&loaded.lines, &target);
        let summary = plan.summary();
        write_artifact(&artifacts.plan, &summary)?;
        write!(io.stdout, "{summary}")?;
        write!(io.stdout, "{}", diff_lines(&loaded.lines, &target))?;
        return Ok(ExitCode::SUCCESS);
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.document));
    let plan = loaded.write_edited(&target, &output, config.apply_mode())?;
    let summary = plan.summary();
    write_artifact(&artifacts.plan, &summary)?;
    info!(target: "loom::cli", output = %output.display(), "edited document written");
    writeln!(io.stdout, "Wrote {}", output.display())?;
    write!(io.stdout, "{summary}")?;
    Ok(ExitCode::SUCCESS)
}

/// Runs the validation loop over the artifact copy of the edits.
///
/// Returns `Some(exit_code)` when the run must stop before applying.
fn run_validation<R, W, E>(
    lines: &LineMap,
    config: &Config,
    artifacts: &RunArtifacts,
    io: &mut IoStreams<'_, R, W, E>,
) -> Result<Option<ExitCode>, AppError>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let interactive = io.stdin_is_terminal;
    let prompt = RefCell::new(Prompt::new(&mut *io.stdin, &mut *io.stderr, interactive));
    let resolution = {
        let validate = || match read_edits(&artifacts.edits) {
            Ok((_, value)) => validate_edits(&value, lines, config.risk()),
            Err(error) => vec![error.to_string()],
        };
        let mut hooks = LoopHooks::new();
        if interactive {
            hooks = hooks.with_manual_edit(|warnings: &[String]| {
                prompt
                    .borrow_mut()
                    .wait_for_edit(&artifacts.edits, warnings);
            });
        }
        let mut host = SharedHost(&prompt);
        ValidationLoop::new(config.max_validation_rounds()).run(
            config.on_error(),
            &mut host,
            validate,
            &mut hooks,
        )
    };

    match resolution {
        Ok(Resolution::Passed { rounds }) => {
            debug!(target: "loom::cli", rounds, "edits validated");
            Ok(None)
        }
        Ok(Resolution::ManualHandoff { warnings }) => {
            write_artifact(&artifacts.warnings, &join_lines(&warnings))?;
            writeln!(
                io.stderr,
                "{} validation warning(s) need fixing by hand in {}",
                warnings.len(),
                artifacts.edits.display()
            )?;
            Ok(Some(ExitCode::FAILURE))
        }
        Err(error) => report_validation_failure(&error, artifacts, io).map(Some),
    }
}

fn report_validation_failure<R, W, E>(
    error: &ValidationError,
    artifacts: &RunArtifacts,
    io: &mut IoStreams<'_, R, W, E>,
) -> Result<ExitCode, AppError>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    writeln!(io.stderr, "{error}")?;
    for warning in error.warnings() {
        writeln!(io.stderr, "  - {warning}")?;
    }

    let hard = matches!(
        error,
        ValidationError::Aborted {
            severity: Severity::Hard,
            ..
        }
    );
    if hard {
        for path in artifacts.cleanup() {
            writeln!(io.stderr, "removed {}", path.display())?;
        }
    } else {
        write_artifact(&artifacts.warnings, &join_lines(error.warnings()))?;
        writeln!(
            io.stderr,
            "artifacts kept in {}",
            artifacts
                .edits
                .parent()
                .map_or_else(|| artifacts.edits.display(), Path::display)
        )?;
    }

    Ok(if error.is_recoverable() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("cv/resume.tex", "cv/resume.edited.tex")]
    #[case("resume.docx", "resume.edited.docx")]
    #[case("notes", "notes.edited")]
    fn default_output_sits_next_to_the_input(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(default_output(Path::new(input)), PathBuf::from(expected));
    }

    #[test]
    fn joined_lines_end_with_newlines() {
        assert_eq!(join_lines(&[]), "");
        assert_eq!(join_lines(&["a".to_owned(), "b".to_owned()]), "a\nb\n");
    }
}
