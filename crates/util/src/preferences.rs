//! Editor preference persistence.
//!
//! A tiny JSON-backed store recording how configuration editors should open:
//! the text format used for the text view, its indentation, and whether
//! secrets start in the text view. The file lives in the standard
//! configuration directory (`~/.config/confmap/preferences.json` on most
//! platforms) and is safe to read/write from multiple threads thanks to the
//! internal `Mutex`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use confmap_types::TextFormat;
use dirs_next::{config_dir, home_dir};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Environment variable allowing callers to override the preferences file path.
pub const PREFERENCES_PATH_ENV: &str = "CONFMAP_PREFERENCES_PATH";

/// Default filename for the JSON payload.
pub const PREFERENCES_FILE_NAME: &str = "preferences.json";

pub const DEFAULT_INDENT: usize = 2;
pub const MAX_INDENT: usize = 8;

/// Error surfaced when reading or writing preferences fails.
#[derive(Debug, Error)]
pub enum PreferencesError {
    /// I/O failure (for example, permissions or missing directory).
    #[error("preferences I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization or deserialization failure.
    #[error("preferences serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persisted preference values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesPayload {
    /// Format used by the text view.
    pub default_format: TextFormat,
    /// Spaces per indentation level in the text view.
    pub indent: usize,
    /// Open secret editors in the text view.
    pub text_first_for_secrets: bool,
}

impl Default for PreferencesPayload {
    fn default() -> Self {
        Self {
            default_format: TextFormat::Yaml,
            indent: DEFAULT_INDENT,
            text_first_for_secrets: false,
        }
    }
}

/// Thread-safe preferences store backed by a JSON file.
#[derive(Debug, Default)]
pub struct EditorPreferences {
    path: PathBuf,
    payload: Mutex<PreferencesPayload>,
    persist_to_disk: bool,
}

impl EditorPreferences {
    /// Loads the store from the default location, honoring
    /// [`PREFERENCES_PATH_ENV`].
    pub fn new() -> Result<Self, PreferencesError> {
        Self::at(default_preferences_path())
    }

    /// Loads the store rooted at `path`.
    pub fn at(path: impl Into<PathBuf>) -> Result<Self, PreferencesError> {
        let path = path.into();
        let payload = load_payload(&path)?;
        Ok(Self {
            path,
            payload: Mutex::new(payload),
            persist_to_disk: true,
        })
    }

    /// Build an in-memory store used as a fallback when the config directory cannot be accessed.
    pub fn ephemeral() -> Self {
        Self {
            path: PathBuf::new(),
            payload: Mutex::new(PreferencesPayload::default()),
            persist_to_disk: false,
        }
    }

    /// Path to the underlying JSON file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_format(&self) -> TextFormat {
        self.lock().default_format
    }

    /// Indentation clamped to `1..=MAX_INDENT`.
    pub fn indent(&self) -> usize {
        self.lock().indent.clamp(1, MAX_INDENT)
    }

    pub fn text_first_for_secrets(&self) -> bool {
        self.lock().text_first_for_secrets
    }

    /// Snapshot of all values.
    pub fn snapshot(&self) -> PreferencesPayload {
        self.lock().clone()
    }

    /// Persist a new text format.
    pub fn set_default_format(&self, format: TextFormat) -> Result<(), PreferencesError> {
        self.update(|payload| payload.default_format = format)
    }

    /// Persist a new indentation width.
    pub fn set_indent(&self, indent: usize) -> Result<(), PreferencesError> {
        self.update(|payload| payload.indent = indent.clamp(1, MAX_INDENT))
    }

    pub fn set_text_first_for_secrets(&self, enabled: bool) -> Result<(), PreferencesError> {
        self.update(|payload| payload.text_first_for_secrets = enabled)
    }

    fn update(&self, apply: impl FnOnce(&mut PreferencesPayload)) -> Result<(), PreferencesError> {
        let mut payload = self.lock();
        apply(&mut payload);
        if self.persist_to_disk {
            self.save_locked(&payload)?;
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, PreferencesPayload> {
        self.payload.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save_locked(&self, payload: &PreferencesPayload) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(payload)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

fn default_preferences_path() -> PathBuf {
    if let Some(path) = env::var(PREFERENCES_PATH_ENV).ok().and_then(|raw| override_path(&raw, home_dir())) {
        return path;
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("confmap")
        .join(PREFERENCES_FILE_NAME)
}

/// Interprets the preferences path override; `~/` resolves against `home`.
///
/// Blank overrides, and `~/` paths without a known home, are ignored.
fn override_path(raw: &str, home: Option<PathBuf>) -> Option<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.strip_prefix("~/") {
        Some(relative) => home.map(|home| home.join(relative)),
        None => Some(PathBuf::from(raw)),
    }
}

fn load_payload(path: &Path) -> Result<PreferencesPayload, PreferencesError> {
    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(payload) => Ok(payload),
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "Failed to parse preferences file; using defaults"
                );
                Ok(PreferencesPayload::default())
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(PreferencesPayload::default()),
        Err(error) => Err(PreferencesError::Io(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_path_expands_home_prefix() {
        let home = Some(PathBuf::from("/home/dev"));
        assert_eq!(override_path(" ~/prefs.json ", home.clone()), Some(PathBuf::from("/home/dev/prefs.json")));
        assert_eq!(override_path("/etc/confmap.json", home), Some(PathBuf::from("/etc/confmap.json")));
        assert_eq!(override_path("~/prefs.json", None), None);
        assert_eq!(override_path("   ", None), None);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefs = EditorPreferences::at(dir.path().join("absent.json")).expect("load preferences");
        assert_eq!(prefs.snapshot(), PreferencesPayload::default());
        assert_eq!(prefs.indent(), DEFAULT_INDENT);
    }

    #[test]
    fn settings_persist_across_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(PREFERENCES_FILE_NAME);

        let prefs = EditorPreferences::at(&path).expect("load preferences");
        prefs.set_default_format(TextFormat::Json).expect("save format");
        prefs.set_indent(4).expect("save indent");
        prefs.set_text_first_for_secrets(true).expect("save text-first");

        let reloaded = EditorPreferences::at(&path).expect("reload preferences");
        assert_eq!(reloaded.default_format(), TextFormat::Json);
        assert_eq!(reloaded.indent(), 4);
        assert!(reloaded.text_first_for_secrets());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(PREFERENCES_FILE_NAME);
        fs::write(&path, "{ not json").expect("write corrupt file");

        let prefs = EditorPreferences::at(&path).expect("load preferences");
        assert_eq!(prefs.default_format(), TextFormat::Yaml);
    }

    #[test]
    fn partial_file_fills_missing_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(PREFERENCES_FILE_NAME);
        fs::write(&path, r#"{ "indent": 40 }"#).expect("write partial file");

        let prefs = EditorPreferences::at(&path).expect("load preferences");
        assert_eq!(prefs.indent(), MAX_INDENT);
        assert_eq!(prefs.default_format(), TextFormat::Yaml);
    }

    #[test]
    fn env_override_selects_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("custom.json");
        temp_env::with_var(PREFERENCES_PATH_ENV, Some(path.to_str().expect("utf8 path")), || {
            let prefs = EditorPreferences::new().expect("load preferences");
            assert_eq!(prefs.path(), path.as_path());
        });
    }

    #[test]
    fn ephemeral_store_never_writes() {
        let prefs = EditorPreferences::ephemeral();
        prefs.set_indent(3).expect("update in memory");
        assert_eq!(prefs.indent(), 3);
        assert_eq!(prefs.path(), Path::new(""));
    }
}
