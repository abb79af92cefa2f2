//! Shared helpers for the confmap crates: key and name rules and editor
//! preferences.

pub mod patterns;
pub mod preferences;

pub use patterns::KeyRule;
pub use preferences::{EditorPreferences, PreferencesError, PreferencesPayload};
