//! Shared fixtures for the configuration integration tests.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use tempfile::TempDir;

/// Serialises every test that touches `LOOM_*` variables.
static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Holds the environment lock and puts back every variable it changed.
pub struct ScopedEnv {
    saved: Vec<(String, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl ScopedEnv {
    pub fn acquire() -> Self {
        Self {
            saved: Vec::new(),
            _lock: ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.saved.push((key.to_owned(), std::env::var_os(key)));
        // SAFETY: mutation happens while ENV_LOCK is held.
        unsafe { std::env::set_var(key, value) };
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (key, previous) in self.saved.drain(..).rev() {
            // SAFETY: the lock guard is still alive until after this body.
            unsafe {
                match previous {
                    Some(value) => std::env::set_var(&key, value),
                    None => std::env::remove_var(&key),
                }
            }
        }
    }
}

/// Writes `contents` to `loom.toml` in `dir` and returns the
/// `--config-path` arguments that select it.
pub fn config_file_args(dir: &TempDir, contents: &str) -> [OsString; 2] {
    let path: PathBuf = dir.path().join("loom.toml");
    fs::write(&path, contents).expect("write configuration file");
    [OsString::from("--config-path"), path.into_os_string()]
}
