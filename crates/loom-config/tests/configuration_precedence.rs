//! Behaviour tests for layered configuration precedence.

mod support;

use std::cell::RefCell;
use std::ffi::OsString;

use loom_config::{Config, DEFAULT_ARTIFACTS_DIR, LogFormat};
use loom_engine::{DocxApplyMode, ReadMode, RiskLevel, ValidationPolicy};
use ortho_config::OrthoConfig;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use support::{ScopedEnv, config_file_args};

/// The layers a scenario stacks up before loading.
struct ConfigWorld {
    dir: TempDir,
    env: RefCell<ScopedEnv>,
    file_lines: RefCell<Vec<String>>,
    cli_args: RefCell<Vec<OsString>>,
}

impl ConfigWorld {
    fn load(&self) -> Config {
        let mut args = vec![OsString::from("loom")];
        let file_lines = self.file_lines.borrow();
        if !file_lines.is_empty() {
            let contents: String = file_lines.iter().map(|line| format!("{line}\n")).collect();
            args.extend(config_file_args(&self.dir, &contents));
        }
        args.extend(self.cli_args.borrow().iter().cloned());
        match Config::load_from_iter(args) {
            Ok(config) => config,
            Err(error) => panic!("configuration failed to load: {error}"),
        }
    }
}

#[fixture]
fn world() -> ConfigWorld {
    ConfigWorld {
        dir: TempDir::new().expect("temp dir"),
        env: RefCell::new(ScopedEnv::acquire()),
        file_lines: RefCell::new(Vec::new()),
        cli_args: RefCell::new(Vec::new()),
    }
}

fn unquote(value: &str) -> &str {
    value.trim_matches('"')
}

#[given("the configuration file sets {key} to {value}")]
fn given_file_value(world: &ConfigWorld, key: String, value: String) {
    world.file_lines.borrow_mut().push(format!("{key} = {value}"));
}

#[given("the environment sets {key} to {value}")]
fn given_env_value(world: &ConfigWorld, key: String, value: String) {
    world.env.borrow_mut().set(&key, unquote(&value));
}

#[when("the command line passes {flags}")]
fn when_cli_flags(world: &ConfigWorld, flags: String) {
    world
        .cli_args
        .borrow_mut()
        .extend(unquote(&flags).split_whitespace().map(OsString::from));
}

#[when("nothing is overridden")]
fn when_nothing_overridden(world: &ConfigWorld) {
    assert!(world.file_lines.borrow().is_empty());
    assert!(world.cli_args.borrow().is_empty());
}

#[then("the built-in defaults apply")]
fn then_defaults(world: &ConfigWorld) {
    let config = world.load();
    assert_eq!(config.log_filter(), "info");
    assert_eq!(config.log_format(), LogFormat::Compact);
    assert_eq!(config.risk(), RiskLevel::Medium);
    assert_eq!(config.on_error(), ValidationPolicy::Ask);
    assert_eq!(config.apply_mode(), DocxApplyMode::InPlace);
    assert_eq!(config.read_mode(), ReadMode::Default);
    assert_eq!(config.artifacts_dir().as_str(), DEFAULT_ARTIFACTS_DIR);
}

#[then("the risk level is {risk}")]
fn then_risk(world: &ConfigWorld, risk: String) {
    let expected: RiskLevel = unquote(&risk).parse().expect("risk level");
    assert_eq!(world.load().risk(), expected);
}

#[then("the failure policy is {policy}")]
fn then_policy(world: &ConfigWorld, policy: String) {
    let expected: ValidationPolicy = unquote(&policy).parse().expect("policy");
    assert_eq!(world.load().on_error(), expected);
}

#[then("text documents keep their physical line numbers")]
fn then_preserving(world: &ConfigWorld) {
    assert_eq!(world.load().read_mode(), ReadMode::PreserveStructure);
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Built-in defaults apply without overrides"
)]
fn defaults_without_overrides(world: ConfigWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "The configuration file overrides defaults"
)]
fn file_overrides_defaults(world: ConfigWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "The environment overrides the configuration file"
)]
fn environment_overrides_file(world: ConfigWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "CLI flags override the environment"
)]
fn cli_overrides_environment(world: ConfigWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Policy aliases are accepted on the command line"
)]
fn policy_alias_on_cli(world: ConfigWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Structure preservation is read from the file"
)]
fn preserve_structure_from_file(world: ConfigWorld) {
    let _ = world;
}
