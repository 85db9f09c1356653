//! Crate-level property and BDD tests.
