//! Wire shapes of the ConfigMap / Secret save request.
//!
//! These structs mirror the JSON the backend expects. They are produced by the
//! engine's payload builder, which is the only place that decides which
//! optional fields are present.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the configuration is consumed by the workload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageType {
    /// Injected as environment variables
    #[default]
    Environment,
    /// Mounted as files
    Volume,
}

/// Request body for creating or updating a ConfigMap or Secret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPayload {
    pub name: String,
    #[serde(rename = "type")]
    pub usage_type: UsageType,
    pub external: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_permission: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_type: Option<String>,
    #[serde(rename = "roleARN", default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_data: Option<Vec<KesSecretItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eso_secret_data: Option<EsoSecretData>,
}

/// One entry of a (deprecated) Kubernetes External Secrets data list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KesSecretItem {
    /// Secret key in the backing store
    #[serde(default)]
    pub key: String,
    /// Name of this key in the generated secret
    #[serde(default)]
    pub name: String,
    /// Property to extract when the stored secret is a JSON object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default)]
    pub is_binary: bool,
}

/// One `esoData` entry of an External Secrets Operator spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EsoDataItem {
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

/// External Secrets Operator section of a secret payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EsoSecretData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_store: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_store_ref: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eso_data: Option<Vec<EsoDataItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eso_data_from: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_omits_unset_optional_fields() {
        let payload = ConfigPayload {
            name: "app-config".into(),
            usage_type: UsageType::Environment,
            external: false,
            data: Some(IndexMap::from([("LOG_LEVEL".to_string(), "debug".to_string())])),
            ..Default::default()
        };

        let json = serde_json::to_value(&payload).expect("serialize ConfigPayload");
        assert_eq!(
            json,
            serde_json::json!({
                "name": "app-config",
                "type": "environment",
                "external": false,
                "data": { "LOG_LEVEL": "debug" }
            })
        );
    }

    #[test]
    fn kes_items_read_camel_case_fields() {
        let yaml = "- key: service/credentials\n  name: secret-key\n  isBinary: true\n";
        let items: Vec<KesSecretItem> = serde_yaml::from_str(yaml).expect("deserialize KesSecretItem list");
        assert_eq!(items.len(), 1);
        assert!(items[0].is_binary);
        assert_eq!(items[0].property, None);
    }

    #[test]
    fn role_arn_uses_backend_spelling() {
        let payload = ConfigPayload {
            role_arn: Some("arn:aws:iam::123:role/x".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&payload).expect("serialize ConfigPayload");
        assert!(json.contains("\"roleARN\""));
    }
}
