//! Conversion between a [`KeyValueModel`] and its YAML or JSON text form.
//!
//! Encoding never fails: every value is written as a string so that the text
//! parses back to the same mapping. Decoding parses the whole document,
//! flattens nested structures into text and annotates keys that break the
//! active [`KeyRule`]. Structural failures leave the previous model in place.

mod yaml_writer;

use confmap_types::{KeyValueEntry, TextFormat};
use confmap_util::KeyRule;
use confmap_util::preferences::{DEFAULT_INDENT, EditorPreferences, MAX_INDENT};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::model::KeyValueModel;

/// Shown when decoded keys break the ConfigMap naming rule.
pub const INVALID_KEYS_SUMMARY: &str = "Error: Keys can contain: (Alphanumeric) (-) (_) (.)";

/// Shown, followed by the offending values, when a value was written as a
/// bare boolean or number.
pub const UNQUOTED_SCALARS_SUMMARY: &str = "Error: Boolean and numeric values must be wrapped in double quotes";

/// Text plus the diagnostics gathered while decoding it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedDocument {
    pub text: String,
    /// Set when the text could not be decoded at all.
    pub parse_error: Option<ParseError>,
    /// Keys that break the naming rule, in document order.
    pub invalid_keys: IndexSet<String>,
    /// Keys whose values were bare booleans or numbers, with those values as text.
    pub unquoted_scalars: IndexMap<String, String>,
}

impl EncodedDocument {
    /// A document with no diagnostics.
    pub fn clean(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.parse_error.is_none() && self.invalid_keys.is_empty() && self.unquoted_scalars.is_empty()
    }

    /// Message for the diagnostics, if any.
    ///
    /// A parse error stands alone; otherwise the key and value problems are
    /// listed on separate lines.
    pub fn summary(&self) -> Option<String> {
        if let Some(error) = &self.parse_error {
            return Some(error.to_string());
        }
        let mut lines = Vec::with_capacity(2);
        if !self.invalid_keys.is_empty() {
            lines.push(format!("{INVALID_KEYS_SUMMARY} | Invalid key(s): {}", quoted_list(&self.invalid_keys)));
        }
        if !self.unquoted_scalars.is_empty() {
            lines.push(format!("{UNQUOTED_SCALARS_SUMMARY} Eg. {}", quoted_list(self.unquoted_scalars.values())));
        }
        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}

fn quoted_list<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items
        .into_iter()
        .map(|item| format!("\"{item}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result of decoding a text document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOutcome {
    pub model: KeyValueModel,
    pub document: EncodedDocument,
}

/// Serializer/parser pair for one text format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextCodec {
    format: TextFormat,
    indent: usize,
}

impl Default for TextCodec {
    fn default() -> Self {
        Self::new(TextFormat::Yaml, DEFAULT_INDENT)
    }
}

impl TextCodec {
    /// Creates a codec; `indent` is clamped to `1..=MAX_INDENT`.
    pub fn new(format: TextFormat, indent: usize) -> Self {
        Self {
            format,
            indent: indent.clamp(1, MAX_INDENT),
        }
    }

    pub fn yaml() -> Self {
        Self::new(TextFormat::Yaml, DEFAULT_INDENT)
    }

    pub fn json() -> Self {
        Self::new(TextFormat::Json, DEFAULT_INDENT)
    }

    /// Codec configured from the stored editor preferences.
    pub fn from_preferences(preferences: &EditorPreferences) -> Self {
        Self::new(preferences.default_format(), preferences.indent())
    }

    pub fn format(&self) -> TextFormat {
        self.format
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    /// Same indentation, different format.
    pub fn with_format(self, format: TextFormat) -> Self {
        Self::new(format, self.indent)
    }

    /// Writes the model's mapping as text.
    pub fn encode(&self, model: &KeyValueModel) -> String {
        self.encode_mapping(&model.to_mapping())
    }

    /// Writes a string mapping as text, keeping its order.
    pub fn encode_mapping(&self, mapping: &IndexMap<String, String>) -> String {
        match self.format {
            TextFormat::Yaml => yaml_writer::write_mapping(mapping, self.indent),
            TextFormat::Json => match to_json_pretty(mapping, self.indent) {
                Ok(mut text) => {
                    text.push('\n');
                    text
                }
                Err(error) => {
                    warn!(error = %error, "failed to encode mapping as JSON");
                    String::from("{}\n")
                }
            },
        }
    }

    /// Decodes `text`, failing on structural errors.
    pub fn try_decode(&self, text: &str, rule: &KeyRule) -> Result<DecodeOutcome, ParseError> {
        let pairs = match self.format {
            TextFormat::Yaml => self.read_yaml(text)?,
            TextFormat::Json => self.read_json(text)?,
        };

        let mut document = EncodedDocument::clean(text);
        let mut entries = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            if key.is_empty() && value.is_empty() {
                continue;
            }
            let mut entry = match value {
                RawValue::Missing => KeyValueEntry::without_value(key.as_str()),
                RawValue::Scalar(text) => {
                    document.unquoted_scalars.insert(key.clone(), text.clone());
                    KeyValueEntry::new(key.as_str(), text)
                }
                RawValue::Text(text) | RawValue::Nested(text) => KeyValueEntry::new(key.as_str(), text),
            };
            if !rule.is_valid(&key) {
                entry.key_error = Some(rule.message_for(&key));
                document.invalid_keys.insert(key);
            }
            entries.push(entry);
        }

        debug!(
            format = %self.format,
            entries = entries.len(),
            invalid_keys = document.invalid_keys.len(),
            "decoded text document"
        );
        Ok(DecodeOutcome {
            model: KeyValueModel::new(entries),
            document,
        })
    }

    /// Decodes `text`, falling back to `previous` when the text is malformed.
    ///
    /// The failure is reported through [`EncodedDocument::parse_error`].
    pub fn decode(&self, text: &str, rule: &KeyRule, previous: &KeyValueModel) -> DecodeOutcome {
        match self.try_decode(text, rule) {
            Ok(outcome) => outcome,
            Err(error) => {
                debug!(format = %self.format, error = %error, "keeping previous model after parse failure");
                DecodeOutcome {
                    model: previous.clone(),
                    document: EncodedDocument {
                        text: text.to_string(),
                        parse_error: Some(error),
                        ..EncodedDocument::default()
                    },
                }
            }
        }
    }

    fn read_yaml(&self, text: &str) -> Result<Vec<(String, RawValue)>, ParseError> {
        use serde_yaml::Value;

        let format = TextFormat::Yaml;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let root: Value = serde_yaml::from_str(text).map_err(|error| ParseError::syntax(format, error))?;
        let mapping = match root {
            Value::Null => return Ok(Vec::new()),
            Value::Mapping(mapping) => mapping,
            other => {
                return Err(ParseError::NonMappingRoot {
                    format,
                    found: yaml_kind(&other),
                });
            }
        };

        let mut pairs = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let key = match key {
                Value::String(key) => key,
                Value::Number(number) => number.to_string(),
                Value::Bool(flag) => flag.to_string(),
                Value::Null => String::new(),
                other => {
                    return Err(ParseError::UnsupportedKey {
                        format,
                        key: yaml_kind(&other).to_string(),
                    });
                }
            };
            let value = match value {
                Value::String(text) => RawValue::Text(text),
                Value::Number(number) => RawValue::Scalar(number.to_string()),
                Value::Bool(flag) => RawValue::Scalar(flag.to_string()),
                Value::Null => RawValue::Missing,
                nested => RawValue::Nested(render_nested(&nested, format, self.indent).map_err(|reason| ParseError::Syntax { format, reason })?),
            };
            pairs.push((key, value));
        }
        Ok(pairs)
    }

    fn read_json(&self, text: &str) -> Result<Vec<(String, RawValue)>, ParseError> {
        use serde_json::Value;

        let format = TextFormat::Json;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let root: Value = serde_json::from_str(text).map_err(|error| ParseError::syntax(format, error))?;
        let object = match root {
            Value::Null => return Ok(Vec::new()),
            Value::Object(object) => object,
            other => {
                return Err(ParseError::NonMappingRoot {
                    format,
                    found: json_kind(&other),
                });
            }
        };

        let mut pairs = Vec::with_capacity(object.len());
        for (key, value) in object {
            let value = match value {
                Value::String(text) => RawValue::Text(text),
                Value::Number(number) => RawValue::Scalar(number.to_string()),
                Value::Bool(flag) => RawValue::Scalar(flag.to_string()),
                Value::Null => RawValue::Missing,
                nested => RawValue::Nested(render_nested(&nested, format, self.indent).map_err(|reason| ParseError::Syntax { format, reason })?),
            };
            pairs.push((key, value));
        }
        Ok(pairs)
    }
}

/// A decoded value before it is turned into a row.
enum RawValue {
    Text(String),
    /// Bare boolean or number, already stringified.
    Scalar(String),
    /// Object or array rendered back to text.
    Nested(String),
    Missing,
}

impl RawValue {
    fn is_empty(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Text(text) => text.is_empty(),
            Self::Scalar(_) | Self::Nested(_) => false,
        }
    }
}

/// Renders a nested JSON value as editable text in `format`.
pub(crate) fn render_nested_json(value: &serde_json::Value, format: TextFormat) -> String {
    render_nested(value, format, DEFAULT_INDENT).unwrap_or_else(|error| {
        warn!(error = %error, "failed to render nested value; using compact JSON");
        value.to_string()
    })
}

fn render_nested<T: Serialize + ?Sized>(value: &T, format: TextFormat, indent: usize) -> Result<String, String> {
    match format {
        TextFormat::Yaml => serde_yaml::to_string(value).map_err(|error| error.to_string()),
        TextFormat::Json => to_json_pretty(value, indent).map_err(|error| error.to_string()),
    }
}

fn to_json_pretty<T: Serialize + ?Sized>(value: &T, indent: usize) -> Result<String, serde_json::Error> {
    let indent = " ".repeat(indent);
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(indent.as_bytes()));
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    use serde_yaml::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
