//! The ordered, editable collection of key/value rows behind every editor.
//!
//! Rows are stored behind an [`Arc`] and every mutation goes through
//! [`Arc::make_mut`]: clones of a model share storage until one of them is
//! edited, and an edit never becomes visible through another clone.

use std::collections::HashMap;
use std::sync::Arc;

use confmap_types::{KeyValueEntry, TextFormat};
use confmap_util::KeyRule;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::codec::render_nested_json;
use crate::error::{EntryError, VALUE_MISSING_MESSAGE};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueModel {
    entries: Arc<Vec<KeyValueEntry>>,
}

impl KeyValueModel {
    pub fn new(entries: Vec<KeyValueEntry>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }

    /// A model holding the single blank row shown when no data exists.
    pub fn placeholder() -> Self {
        Self::new(vec![KeyValueEntry::blank()])
    }

    /// Builds a model from plain string pairs, preserving their order.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(pairs.into_iter().map(|(key, value)| KeyValueEntry::new(key, value)).collect())
    }

    /// Flattens an external mapping into one row per key.
    ///
    /// Objects and arrays are rendered as indented text in `nested_format`
    /// so they can be edited as a single string; other scalars use their
    /// textual form and `null` becomes a missing value. An empty mapping
    /// yields the placeholder row.
    pub fn from_mapping(mapping: &Map<String, Value>, nested_format: TextFormat) -> Self {
        if mapping.is_empty() {
            return Self::placeholder();
        }
        let entries = mapping
            .iter()
            .map(|(key, value)| match value {
                Value::String(text) => KeyValueEntry::new(key.as_str(), text.as_str()),
                Value::Null => KeyValueEntry::without_value(key.as_str()),
                Value::Bool(_) | Value::Number(_) => KeyValueEntry::new(key.as_str(), value.to_string()),
                Value::Object(_) | Value::Array(_) => KeyValueEntry::new(key.as_str(), render_nested_json(value, nested_format)),
            })
            .collect();
        Self::new(entries)
    }

    /// Folds the rows into a mapping.
    ///
    /// Rows without a key are skipped and missing values become empty
    /// strings. When a key repeats, the later value wins while the first
    /// position is kept.
    pub fn to_mapping(&self) -> IndexMap<String, String> {
        let mut mapping = IndexMap::with_capacity(self.entries.len());
        for entry in self.entries.iter().filter(|entry| !entry.key.is_empty()) {
            mapping.insert(entry.key.clone(), entry.value_or_empty().to_string());
        }
        mapping
    }

    pub fn entries(&self) -> &[KeyValueEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&KeyValueEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` when any row carries an error annotation.
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(KeyValueEntry::has_errors)
    }

    /// Replaces the row at `index`, clearing both error annotations.
    ///
    /// Returns `false` when `index` is out of bounds.
    pub fn set_entry(&mut self, index: usize, key: impl Into<String>, value: impl Into<String>) -> bool {
        if index >= self.entries.len() {
            return false;
        }
        Arc::make_mut(&mut self.entries)[index] = KeyValueEntry::new(key, value);
        true
    }

    /// Removes the row at `index`, shifting later rows down.
    ///
    /// Returns `false` when `index` is out of bounds. Removing the last row
    /// leaves an empty model.
    pub fn delete_entry(&mut self, index: usize) -> bool {
        if index >= self.entries.len() {
            return false;
        }
        Arc::make_mut(&mut self.entries).remove(index);
        true
    }

    /// Appends an empty row.
    pub fn append_blank(&mut self) {
        Arc::make_mut(&mut self.entries).push(KeyValueEntry::blank());
    }

    /// Re-derives the error annotations of every row without touching `self`.
    ///
    /// Blank rows are dropped from the output. A row with a key but no value
    /// gets a value error. A key that appears more than once (ignoring
    /// surrounding whitespace) gets a key error on every row that uses it;
    /// otherwise a row with a value whose key breaks `rule` gets a key error.
    pub fn validate_all(&self, rule: &KeyRule) -> ValidationReport {
        let kept: Vec<&KeyValueEntry> = self.entries.iter().filter(|entry| !entry.is_blank()).collect();

        let mut key_counts: HashMap<&str, usize> = HashMap::with_capacity(kept.len());
        for entry in kept.iter().copied() {
            let key = entry.key.trim();
            if !key.is_empty() {
                *key_counts.entry(key).or_default() += 1;
            }
        }

        let mut errors = Vec::new();
        let mut entries = Vec::with_capacity(kept.len());
        for (index, entry) in kept.into_iter().enumerate() {
            let mut validated = entry.without_errors();
            let key = entry.key.clone();
            if key_counts.get(entry.key.trim()).is_some_and(|count| *count > 1) {
                let error = EntryError::DuplicateKey { index, key: key.clone() };
                validated.key_error = Some(error.to_string());
                errors.push(error);
            } else if entry.value.is_some() && !rule.is_valid(&entry.key) {
                let message = rule.message_for(&entry.key);
                validated.key_error = Some(message.clone());
                errors.push(EntryError::KeyPattern {
                    index,
                    key: key.clone(),
                    message,
                });
            }
            if !entry.key.is_empty() && entry.value.is_none() {
                validated.value_error = Some(VALUE_MISSING_MESSAGE.to_string());
                errors.push(EntryError::ValueMissing { index, key });
            }
            entries.push(validated);
        }

        ValidationReport {
            is_valid: errors.is_empty(),
            entries,
            errors,
        }
    }
}

impl From<Vec<KeyValueEntry>> for KeyValueModel {
    fn from(entries: Vec<KeyValueEntry>) -> Self {
        Self::new(entries)
    }
}

/// Outcome of [`KeyValueModel::validate_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub is_valid: bool,
    /// Validated rows with blank rows removed and errors re-derived.
    pub entries: Vec<KeyValueEntry>,
    errors: Vec<EntryError>,
}

impl ValidationReport {
    /// Row errors, indexed by position in [`ValidationReport::entries`].
    pub fn errors(&self) -> Vec<EntryError> {
        self.errors.clone()
    }

    pub fn into_model(self) -> KeyValueModel {
        KeyValueModel::new(self.entries)
    }
}
