//! Terminal prompts for the interactive validation policies.

use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::path::Path;

use loom_engine::ValidationPolicy;
use loom_engine::strategy::ValidationHost;
use tracing::debug;

const POLICY_MENU: &str =
    "Choose: [r]etry, [m]anual edit, [c]hange model, fail [s]oft, fail [h]ard";

/// Line-oriented prompt over an input reader and an output writer.
pub(crate) struct Prompt<R: BufRead, E: Write> {
    input: R,
    output: E,
    interactive: bool,
}

impl<R: BufRead, E: Write> Prompt<R, E> {
    pub(crate) const fn new(input: R, output: E, interactive: bool) -> Self {
        Self {
            input,
            output,
            interactive,
        }
    }

    fn say(&mut self, message: &str) {
        if let Err(error) = writeln!(self.output, "{message}") {
            debug!(target: "loom::cli", %error, "prompt output failed");
        }
    }

    /// Reads one trimmed line; `None` on end of input or a read error.
    fn read_answer(&mut self) -> Option<String> {
        if let Err(error) = self.output.flush() {
            debug!(target: "loom::cli", %error, "prompt flush failed");
        }
        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(0) => None,
            Ok(_) => Some(answer.trim().to_owned()),
            Err(error) => {
                debug!(target: "loom::cli", %error, "prompt input failed");
                None
            }
        }
    }

    /// Shows the warnings and waits until the user has edited the batch.
    pub(crate) fn wait_for_edit(&mut self, edits: &Path, warnings: &[String]) {
        self.say(&format!(
            "Fix the {} warning(s) in {} and press Enter to validate again.",
            warnings.len(),
            edits.display()
        ));
        if self.read_answer().is_none() {
            debug!(target: "loom::cli", "input closed while waiting for manual edit");
        }
    }
}

impl<R: BufRead, E: Write> ValidationHost for Prompt<R, E> {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn present(&mut self, warnings: &[String]) {
        self.say(&format!("Validation found {} warning(s):", warnings.len()));
        for warning in warnings {
            self.say(&format!("  - {warning}"));
        }
    }

    fn choose_policy(&mut self, _warnings: &[String]) -> Option<ValidationPolicy> {
        self.say(POLICY_MENU);
        match self.read_answer() {
            Some(answer) => ValidationPolicy::from_choice(&answer),
            // Nobody left to answer.
            None => Some(ValidationPolicy::FailSoft),
        }
    }

    fn choose_model(&mut self) -> Option<String> {
        self.say("Model to retry with (blank keeps the current one):");
        self.read_answer().filter(|model| !model.is_empty())
    }
}

/// Lets the validation loop and its manual-edit hook share one prompt.
pub(crate) struct SharedHost<'p, R: BufRead, E: Write>(pub(crate) &'p RefCell<Prompt<R, E>>);

impl<R: BufRead, E: Write> ValidationHost for SharedHost<'_, R, E> {
    fn is_interactive(&self) -> bool {
        self.0.borrow().is_interactive()
    }

    fn present(&mut self, warnings: &[String]) {
        self.0.borrow_mut().present(warnings);
    }

    fn choose_policy(&mut self, warnings: &[String]) -> Option<ValidationPolicy> {
        self.0.borrow_mut().choose_policy(warnings)
    }

    fn choose_model(&mut self) -> Option<String> {
        self.0.borrow_mut().choose_model()
    }
}
