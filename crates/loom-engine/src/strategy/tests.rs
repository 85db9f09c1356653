//! Tests for policy handling, the validation loop and artifact cleanup.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;

/// Host that replays scripted answers.
#[derive(Debug, Default)]
struct ScriptedHost {
    interactive: bool,
    answers: VecDeque<Option<ValidationPolicy>>,
    model: Option<String>,
    presented: Vec<Vec<String>>,
    prompts: usize,
}

impl ScriptedHost {
    fn interactive(answers: impl IntoIterator<Item = Option<ValidationPolicy>>) -> Self {
        Self {
            interactive: true,
            answers: answers.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl ValidationHost for ScriptedHost {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn present(&mut self, warnings: &[String]) {
        self.presented.push(warnings.to_vec());
    }

    fn choose_policy(&mut self, _warnings: &[String]) -> Option<ValidationPolicy> {
        self.prompts += 1;
        self.answers
            .pop_front()
            .unwrap_or(Some(ValidationPolicy::FailHard))
    }

    fn choose_model(&mut self) -> Option<String> {
        self.model.clone()
    }
}

#[fixture]
fn warnings() -> Vec<String> {
    vec!["Op 0: line 9 not in resume bounds".to_owned()]
}

#[rstest]
#[case(ValidationPolicy::Ask)]
#[case(ValidationPolicy::FailHard)]
#[case(ValidationPolicy::ModelRetry)]
fn empty_warnings_always_pass(#[case] policy: ValidationPolicy) {
    let mut host = ScriptedHost::default();
    assert_eq!(
        handle(policy, &[], &mut host),
        Ok(ValidationOutcome::passed())
    );
}

#[rstest]
fn retry_continues_with_the_warnings(warnings: Vec<String>) {
    let mut host = ScriptedHost::default();
    let outcome = handle(ValidationPolicy::Retry, &warnings, &mut host).expect("outcome");
    assert!(!outcome.success);
    assert!(outcome.should_continue);
    assert_eq!(outcome.value, OutcomeValue::Warnings(warnings));
}

#[rstest]
#[case(ValidationPolicy::Ask, "Ask mode")]
#[case(ValidationPolicy::Manual, "Manual mode")]
#[case(ValidationPolicy::ModelRetry, "Model change")]
fn interactive_policies_need_a_terminal(
    warnings: Vec<String>,
    #[case] policy: ValidationPolicy,
    #[case] mode: &str,
) {
    let mut host = ScriptedHost::default();
    let error = handle(policy, &warnings, &mut host).expect_err("not interactive");
    assert!(matches!(&error, ValidationError::NotInteractive { mode: found, .. } if *found == mode));
    assert!(!error.is_recoverable());
    assert_eq!(error.warnings(), warnings.as_slice());
}

#[rstest]
#[case(ValidationPolicy::FailSoft, Severity::Soft, true)]
#[case(ValidationPolicy::FailHard, Severity::Hard, false)]
fn fail_policies_abort(
    warnings: Vec<String>,
    #[case] policy: ValidationPolicy,
    #[case] severity: Severity,
    #[case] recoverable: bool,
) {
    let mut host = ScriptedHost::default();
    let error = handle(policy, &warnings, &mut host).expect_err("aborted");
    assert_eq!(
        error,
        ValidationError::Aborted {
            severity,
            warnings: warnings.clone()
        }
    );
    assert_eq!(error.is_recoverable(), recoverable);
}

#[rstest]
fn ask_reprompts_until_a_usable_choice(warnings: Vec<String>) {
    let mut host = ScriptedHost::interactive([
        None,
        Some(ValidationPolicy::Ask),
        Some(ValidationPolicy::Manual),
    ]);
    let outcome = handle(ValidationPolicy::Ask, &warnings, &mut host).expect("outcome");
    assert!(!outcome.success);
    assert!(!outcome.should_continue);
    assert_eq!(host.prompts, 3);
    assert_eq!(host.presented, vec![warnings]);
}

#[rstest]
fn model_retry_carries_the_chosen_model(warnings: Vec<String>) {
    let mut host = ScriptedHost {
        model: Some("gpt-5-mini".to_owned()),
        ..ScriptedHost::interactive([])
    };
    let outcome = handle(ValidationPolicy::ModelRetry, &warnings, &mut host).expect("outcome");
    assert_eq!(outcome.value, OutcomeValue::Model("gpt-5-mini".to_owned()));
    assert!(outcome.should_continue);
}

#[rstest]
fn model_retry_without_a_model_is_a_plain_retry(warnings: Vec<String>) {
    let mut host = ScriptedHost::interactive([]);
    let outcome = handle(ValidationPolicy::ModelRetry, &warnings, &mut host).expect("outcome");
    assert_eq!(outcome.value, OutcomeValue::Warnings(warnings));
    assert!(outcome.should_continue);
}

#[rstest]
#[case("ask", ValidationPolicy::Ask)]
#[case("soft", ValidationPolicy::FailSoft)]
#[case("fail_hard", ValidationPolicy::FailHard)]
#[case("HARD", ValidationPolicy::FailHard)]
#[case("change_model", ValidationPolicy::ModelRetry)]
#[case("model_retry", ValidationPolicy::ModelRetry)]
fn policies_parse_with_aliases(#[case] raw: &str, #[case] expected: ValidationPolicy) {
    assert_eq!(raw.parse::<ValidationPolicy>(), Ok(expected));
}

#[rstest]
#[case("s", Some(ValidationPolicy::FailSoft))]
#[case(" H ", Some(ValidationPolicy::FailHard))]
#[case("c", Some(ValidationPolicy::ModelRetry))]
#[case("ask", None)]
#[case("x", None)]
fn interactive_answers_map_to_policies(
    #[case] answer: &str,
    #[case] expected: Option<ValidationPolicy>,
) {
    assert_eq!(ValidationPolicy::from_choice(answer), expected);
}

#[test]
fn loop_passes_after_regeneration() {
    let round = Cell::new(0_u32);
    let regenerated = RefCell::new(Vec::new());
    let mut hooks = LoopHooks::new().with_regenerate(|prior: &[String], model: Option<&str>| {
        regenerated
            .borrow_mut()
            .push((prior.len(), model.map(str::to_owned)));
    });
    let mut host = ScriptedHost::default();
    let resolution = ValidationLoop::new(5)
        .run(
            ValidationPolicy::Retry,
            &mut host,
            || {
                round.set(round.get() + 1);
                if round.get() < 3 {
                    vec!["still broken".to_owned()]
                } else {
                    Vec::new()
                }
            },
            &mut hooks,
        )
        .expect("resolution");
    drop(hooks);
    assert_eq!(resolution, Resolution::Passed { rounds: 3 });
    assert_eq!(regenerated.into_inner(), vec![(1, None), (1, None)]);
}

#[test]
fn retry_without_hooks_hands_over_to_the_user() {
    let mut host = ScriptedHost::default();
    let resolution = ValidationLoop::new(5)
        .run(
            ValidationPolicy::Retry,
            &mut host,
            || vec!["broken".to_owned()],
            &mut LoopHooks::new(),
        )
        .expect("resolution");
    assert_eq!(
        resolution,
        Resolution::ManualHandoff {
            warnings: vec!["broken".to_owned()]
        }
    );
}

#[test]
fn manual_edit_hook_is_awaited_before_revalidation() {
    let edited = Cell::new(false);
    let mut hooks = LoopHooks::new().with_manual_edit(|_: &[String]| edited.set(true));
    let mut host = ScriptedHost::interactive([]);
    let resolution = ValidationLoop::new(3)
        .run(
            ValidationPolicy::Manual,
            &mut host,
            || {
                if edited.get() {
                    Vec::new()
                } else {
                    vec!["fix me".to_owned()]
                }
            },
            &mut hooks,
        )
        .expect("resolution");
    assert_eq!(resolution, Resolution::Passed { rounds: 2 });
}

#[test]
fn loop_gives_up_after_max_rounds() {
    let mut hooks = LoopHooks::new().with_regenerate(|_: &[String], _: Option<&str>| {});
    let mut host = ScriptedHost::default();
    let error = ValidationLoop::new(2)
        .run(
            ValidationPolicy::Retry,
            &mut host,
            || vec!["never fixed".to_owned()],
            &mut hooks,
        )
        .expect_err("exhausted");
    assert_eq!(
        error,
        ValidationError::Exhausted {
            rounds: 2,
            warnings: vec!["never fixed".to_owned()]
        }
    );
}

#[rstest]
#[case(0, ValidationPolicy::FailSoft, Severity::Soft)]
#[case(1, ValidationPolicy::FailSoft, Severity::Soft)]
#[case(1, ValidationPolicy::FailHard, Severity::Hard)]
fn single_round_still_applies_the_policy(
    warnings: Vec<String>,
    #[case] max_rounds: u32,
    #[case] policy: ValidationPolicy,
    #[case] severity: Severity,
) {
    let mut host = ScriptedHost::default();
    let error = ValidationLoop::new(max_rounds)
        .run(policy, &mut host, || warnings.clone(), &mut LoopHooks::new())
        .expect_err("aborted");
    assert_eq!(
        error,
        ValidationError::Aborted {
            severity,
            warnings: warnings.clone()
        }
    );
}

#[rstest]
fn single_round_ask_prompts_before_giving_up(warnings: Vec<String>) {
    let mut hooks = LoopHooks::new().with_manual_edit(|_: &[String]| {});
    let mut host = ScriptedHost::interactive([Some(ValidationPolicy::Manual)]);
    let error = ValidationLoop::new(1)
        .run(ValidationPolicy::Ask, &mut host, || warnings.clone(), &mut hooks)
        .expect_err("exhausted");
    assert_eq!(host.prompts, 1);
    assert_eq!(
        error,
        ValidationError::Exhausted {
            rounds: 1,
            warnings: warnings.clone()
        }
    );
}

#[test]
fn cleanup_removes_existing_artifacts_only() {
    let dir = TempDir::new().expect("temp dir");
    let artifacts = RunArtifacts::in_dir(&dir.path().join("run"));
    RunArtifacts::write(&artifacts.edits, "{}").expect("edits");
    RunArtifacts::write(&artifacts.plan, "plan").expect("plan");

    let deleted = artifacts.cleanup();
    assert_eq!(deleted, vec![artifacts.edits.clone(), artifacts.plan.clone()]);
    assert!(artifacts.paths().iter().all(|path| !path.exists()));
}
