//! Shared test utilities for integration tests
//!
//! Recording formatters, isolated XDG environments, and helpers to build
//! contexts over throwaway storage.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use upfile::formatter::{temp_output, FormatInput, FormatScope, Formatter, Produced};
use upfile::ContextError;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = parking_lot::const_mutex(());

/// Run `f` with XDG_CONFIG_HOME and HOME pointing into `test_dir`, and no
/// UPFILE_* variables set. The previous environment is restored afterwards.
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock();
    let keys = ["HOME", "XDG_CONFIG_HOME", "UPFILE_ENV", "UPFILE_LOG"];
    let saved: Vec<(&str, Option<String>)> =
        keys.iter().map(|k| (*k, std::env::var(k).ok())).collect();

    let config_home = test_dir.path().join("config-home");
    let home = test_dir.path().join("home");
    std::fs::create_dir_all(&config_home).unwrap();
    std::fs::create_dir_all(&home).unwrap();
    std::env::set_var("HOME", &home);
    std::env::set_var("XDG_CONFIG_HOME", &config_home);
    std::env::remove_var("UPFILE_ENV");
    std::env::remove_var("UPFILE_LOG");

    let result = f();

    for (key, value) in saved {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
    result
}

/// Write `config/config.toml` under `workspace`.
pub fn write_workspace_config(workspace: &Path, toml: &str) {
    let dir = workspace.join("config");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), toml).unwrap();
}

/// Formatter that appends a marker to its input.
///
/// Counts its calls and remembers every input it was handed and every
/// output it created, so tests can check what ran on what and what was
/// left behind.
#[derive(Debug, Clone)]
pub struct Recorder {
    marker: &'static str,
    calls: Arc<AtomicUsize>,
    inputs: Arc<Mutex<Vec<Vec<u8>>>>,
    outputs: Arc<Mutex<Vec<PathBuf>>>,
}

impl Recorder {
    pub fn new(marker: &'static str) -> Self {
        Self {
            marker,
            calls: Arc::new(AtomicUsize::new(0)),
            inputs: Arc::new(Mutex::new(Vec::new())),
            outputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Contents of every input seen, in call order.
    pub fn inputs(&self) -> Vec<Vec<u8>> {
        self.inputs.lock().clone()
    }

    pub fn outputs(&self) -> Vec<PathBuf> {
        self.outputs.lock().clone()
    }
}

impl Formatter for Recorder {
    fn format(
        &self,
        input: FormatInput<'_>,
        _scope: &mut FormatScope<'_>,
    ) -> Result<Produced, ContextError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut bytes = std::fs::read(input.path)?;
        self.inputs.lock().push(bytes.clone());
        bytes.extend_from_slice(self.marker.as_bytes());
        let out = temp_output(Some("txt"))?;
        std::fs::write(&out, bytes)?;
        self.outputs.lock().push(out.clone());
        Ok(Produced::temporary(out))
    }
}

/// Assert no formatter output is still on disk.
pub fn assert_cleaned_up(recorders: &[&Recorder]) {
    for recorder in recorders {
        for path in recorder.outputs() {
            assert!(!path.exists(), "temp output left behind: {}", path.display());
        }
    }
}
