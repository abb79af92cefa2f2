use std::{error::Error, fmt, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

pub mod payload;
pub mod redacted;

pub use payload::{ConfigPayload, EsoDataItem, EsoSecretData, KesSecretItem, UsageType};
pub use redacted::{REDACTION_MASK, Redacted, RedactedError};

/// A single editable row of a configuration editor.
///
/// Rows are tentative while the user types: duplicate or malformed keys are
/// tolerated and only surface as errors when the owning model is validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueEntry {
    /// User supplied identifier (e.g. `LOG_LEVEL`)
    pub key: String,
    /// Row value; `None` when the value was never supplied
    pub value: Option<String>,
    /// Set when the key is missing or fails the naming rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_error: Option<String>,
    /// Set when a key is present without a value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_error: Option<String>,
}

impl KeyValueEntry {
    /// Creates a row with the given key and value and no error annotations.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            key_error: None,
            value_error: None,
        }
    }

    /// Creates a row whose value was never supplied.
    pub fn without_value(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Creates the empty placeholder row shown when no data exists.
    pub fn blank() -> Self {
        Self {
            value: Some(String::new()),
            ..Self::default()
        }
    }

    /// Returns `true` when neither a key nor a value has been entered.
    pub fn is_blank(&self) -> bool {
        self.key.is_empty() && self.value.as_deref().is_none_or(str::is_empty)
    }

    /// Returns `true` when either error annotation is set.
    pub fn has_errors(&self) -> bool {
        self.key_error.is_some() || self.value_error.is_some()
    }

    /// The value as text, defaulting to the empty string.
    pub fn value_or_empty(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }

    /// Returns a copy of the row with both error annotations cleared.
    pub fn without_errors(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            key_error: None,
            value_error: None,
        }
    }
}

/// Which side of a dual view editor is authoritative.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// The row-by-row list editor
    #[default]
    Gui,
    /// The structured text editor
    Text,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gui => f.write_str("gui"),
            Self::Text => f.write_str("text"),
        }
    }
}

/// Structured text flavours understood by the codec.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormat {
    #[default]
    Yaml,
    Json,
}

impl TextFormat {
    /// Guesses the format from a file extension, defaulting to YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yaml => "YAML",
            Self::Json => "JSON",
        }
    }
}

impl fmt::Display for TextFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextFormat {
    type Err = ParseTextFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(ParseTextFormatError),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseTextFormatError;

impl fmt::Display for ParseTextFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid text format; expected 'yaml' or 'json'")
    }
}

impl Error for ParseTextFormatError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_rows_ignore_missing_or_empty_values() {
        assert!(KeyValueEntry::blank().is_blank());
        assert!(KeyValueEntry::default().is_blank());
        assert!(!KeyValueEntry::without_value("a").is_blank());
        assert!(!KeyValueEntry::new("", "x").is_blank());
    }

    #[test]
    fn entry_deserializes_without_error_fields() {
        let json = r#"{ "key": "LOG_LEVEL", "value": "debug" }"#;
        let entry: KeyValueEntry = serde_json::from_str(json).expect("deserialize KeyValueEntry");
        assert_eq!(entry, KeyValueEntry::new("LOG_LEVEL", "debug"));

        let back = serde_json::to_string(&entry).expect("serialize KeyValueEntry");
        assert!(!back.contains("key_error"));
    }

    #[test]
    fn text_format_parses_common_spellings() {
        assert_eq!("yml".parse::<TextFormat>(), Ok(TextFormat::Yaml));
        assert_eq!(" JSON ".parse::<TextFormat>(), Ok(TextFormat::Json));
        assert!("toml".parse::<TextFormat>().is_err());
        assert_eq!(TextFormat::from_path("values.json"), TextFormat::Json);
        assert_eq!(TextFormat::from_path("values"), TextFormat::Yaml);
    }

    #[test]
    fn view_mode_round_trips_through_serde() {
        let encoded = serde_yaml::to_string(&ViewMode::Text).expect("serialize ViewMode");
        assert_eq!(encoded.trim(), "text");
        let decoded: ViewMode = serde_yaml::from_str(&encoded).expect("deserialize ViewMode");
        assert_eq!(decoded, ViewMode::Text);
    }
}
