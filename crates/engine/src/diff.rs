//! Key-level comparison between saved and edited data.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub adds: usize,
    pub updates: usize,
    pub removes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "lowercase")]
pub enum MappingChange {
    Added { key: String, value: String },
    Changed { key: String, before: String, after: String },
    Removed { key: String, value: String },
}

impl MappingChange {
    pub fn key(&self) -> &str {
        match self {
            Self::Added { key, .. } | Self::Changed { key, .. } | Self::Removed { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDiff {
    pub changes: Vec<MappingChange>,
}

impl MappingDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for change in &self.changes {
            match change {
                MappingChange::Added { .. } => summary.adds += 1,
                MappingChange::Changed { .. } => summary.updates += 1,
                MappingChange::Removed { .. } => summary.removes += 1,
            }
        }
        summary
    }
}

/// Additions and changes follow `edited` order; removals follow `base` order
/// and come last.
pub fn diff_mappings(base: &IndexMap<String, String>, edited: &IndexMap<String, String>) -> MappingDiff {
    let mut changes = Vec::new();
    for (key, after) in edited {
        match base.get(key) {
            None => changes.push(MappingChange::Added {
                key: key.clone(),
                value: after.clone(),
            }),
            Some(before) if before != after => changes.push(MappingChange::Changed {
                key: key.clone(),
                before: before.clone(),
                after: after.clone(),
            }),
            Some(_) => {}
        }
    }
    for (key, value) in base {
        if !edited.contains_key(key) {
            changes.push(MappingChange::Removed {
                key: key.clone(),
                value: value.clone(),
            });
        }
    }
    MappingDiff { changes }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
    }

    #[test]
    fn reports_adds_updates_and_removes() {
        let base = mapping(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let edited = mapping(&[("b", "20"), ("a", "1"), ("d", "4")]);
        let diff = diff_mappings(&base, &edited);

        let keys: Vec<_> = diff.changes.iter().map(MappingChange::key).collect();
        assert_eq!(keys, ["b", "d", "c"]);
        assert_eq!(diff.summary(), DiffSummary { adds: 1, updates: 1, removes: 1 });
    }

    #[test]
    fn identical_mappings_have_no_changes() {
        let base = mapping(&[("a", "1")]);
        assert!(diff_mappings(&base, &base.clone()).is_empty());
    }

    #[test]
    fn changes_serialize_with_a_tag() {
        let change = MappingChange::Removed {
            key: "a".into(),
            value: "1".into(),
        };
        assert_eq!(
            serde_json::to_value(&change).expect("serialize"),
            serde_json::json!({ "change": "removed", "key": "a", "value": "1" })
        );
    }
}
