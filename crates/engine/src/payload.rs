//! Assembly of the ConfigMap / Secret save request.
//!
//! The source of the data and the way it is consumed are separate tagged
//! choices, so combinations the backend does not accept (an external secret
//! with inline values, a volume without a mount path) cannot be expressed.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use confmap_types::{ConfigPayload, KesSecretItem, REDACTION_MASK, UsageType};
use indexmap::IndexMap;
use tracing::debug;

use crate::error::SubmissionError;
use crate::secret::{EsoProvider, EsoSpec, KesProvider, validate_kes_items};
use crate::validation::{FilePermission, validate_config_name, validate_mount_path};

/// `externalType` of a secret that mounts an existing Kubernetes secret.
pub const EXISTING_SECRET_TYPE: &str = "KubernetesSecret";

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    ConfigMap(ConfigMapSource),
    Secret(SecretSource),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigMapSource {
    /// Values edited in the form.
    Inline { data: IndexMap<String, String> },
    /// A ConfigMap that already exists in the cluster.
    MountExisting,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SecretSource {
    /// Values edited in the form; sent base64 encoded.
    Kubernetes { data: IndexMap<String, String> },
    /// A Secret that already exists in the cluster.
    MountExisting,
    Kes {
        provider: KesProvider,
        role_arn: Option<String>,
        items: Vec<KesSecretItem>,
    },
    Eso {
        provider: EsoProvider,
        role_arn: Option<String>,
        spec: EsoSpec,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Usage {
    #[default]
    Environment,
    Volume(VolumeMount),
}

/// Whether each key is mounted as its own file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubPath {
    #[default]
    Disabled,
    /// One file per key of the inline data.
    PerKey,
    /// One file per listed key; only for externally managed data.
    Keys(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub mount_path: String,
    pub sub_path: SubPath,
    pub file_permission: Option<FilePermission>,
}

impl VolumeMount {
    pub fn new(mount_path: impl Into<String>) -> Self {
        Self {
            mount_path: mount_path.into(),
            sub_path: SubPath::Disabled,
            file_permission: None,
        }
    }

    pub fn with_sub_path(mut self, sub_path: SubPath) -> Self {
        self.sub_path = sub_path;
        self
    }

    pub fn with_file_permission(mut self, permission: FilePermission) -> Self {
        self.file_permission = Some(permission);
        self
    }
}

impl ConfigSource {
    /// `true` when the data lives outside the form.
    pub fn is_external(&self) -> bool {
        !matches!(
            self,
            Self::ConfigMap(ConfigMapSource::Inline { .. }) | Self::Secret(SecretSource::Kubernetes { .. })
        )
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::ConfigMap(_) => "configmap",
            Self::Secret(_) => "secret",
        }
    }
}

/// Builds a [`ConfigPayload`] after checking every field.
#[derive(Debug, Clone)]
pub struct ConfigPayloadBuilder {
    name: String,
    source: ConfigSource,
    usage: Usage,
}

impl ConfigPayloadBuilder {
    pub fn new(name: impl Into<String>, source: ConfigSource) -> Self {
        Self {
            name: name.into(),
            source,
            usage: Usage::Environment,
        }
    }

    pub fn usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn build(self) -> Result<ConfigPayload, SubmissionError> {
        validate_config_name(&self.name)?;
        let kind = self.source.kind();
        let external = self.source.is_external();

        let mut payload = ConfigPayload {
            name: self.name,
            external,
            ..ConfigPayload::default()
        };

        match self.source {
            ConfigSource::ConfigMap(ConfigMapSource::Inline { data }) => {
                if data.is_empty() {
                    return Err(SubmissionError::NoData { kind });
                }
                payload.data = Some(data);
            }
            ConfigSource::ConfigMap(ConfigMapSource::MountExisting) => {}
            ConfigSource::Secret(SecretSource::Kubernetes { data }) => {
                if data.is_empty() {
                    return Err(SubmissionError::NoData { kind });
                }
                if let Some((key, _)) = data.iter().find(|(_, value)| value.as_str() == REDACTION_MASK) {
                    return Err(SubmissionError::MaskedValue { key: key.clone() });
                }
                payload.data = Some(
                    data.into_iter()
                        .map(|(key, value)| (key, STANDARD.encode(value)))
                        .collect(),
                );
                payload.external_type = Some(String::new());
                payload.role_arn = Some(String::new());
            }
            ConfigSource::Secret(SecretSource::MountExisting) => {
                payload.external_type = Some(EXISTING_SECRET_TYPE.to_string());
                payload.role_arn = Some(String::new());
            }
            ConfigSource::Secret(SecretSource::Kes {
                provider,
                role_arn,
                items,
            }) => {
                validate_kes_items(&items)?;
                payload.external_type = Some(provider.as_str().to_string());
                payload.role_arn = Some(role_arn.unwrap_or_default());
                payload.secret_data = Some(items);
            }
            ConfigSource::Secret(SecretSource::Eso {
                provider,
                role_arn,
                spec,
            }) => {
                payload.external_type = Some(provider.as_str().to_string());
                payload.role_arn = Some(role_arn.unwrap_or_default());
                payload.eso_secret_data = Some(spec.to_wire());
            }
        }

        match self.usage {
            Usage::Environment => payload.usage_type = UsageType::Environment,
            Usage::Volume(volume) => {
                validate_mount_path(&volume.mount_path)?;
                payload.usage_type = UsageType::Volume;
                payload.mount_path = Some(volume.mount_path);
                payload.file_permission = volume.file_permission.map(FilePermission::into_string);
                payload.sub_path = Some(!matches!(volume.sub_path, SubPath::Disabled));
                if let SubPath::Keys(keys) = volume.sub_path {
                    if !external {
                        return Err(SubmissionError::SubPathKeysRequireExternal);
                    }
                    payload.data = Some(keys.into_iter().map(|key| (key, String::new())).collect());
                }
            }
        }

        debug!(
            name = %payload.name,
            kind,
            external,
            usage = ?payload.usage_type,
            "built config payload"
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldError;
    use serde_json::json;

    fn data(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
    }

    #[test]
    fn inline_config_map_for_environment() {
        let payload = ConfigPayloadBuilder::new(
            "app-config",
            ConfigSource::ConfigMap(ConfigMapSource::Inline {
                data: data(&[("LOG_LEVEL", "debug")]),
            }),
        )
        .build()
        .expect("valid payload");

        assert_eq!(
            serde_json::to_value(&payload).expect("serialize"),
            json!({ "name": "app-config", "type": "environment", "external": false, "data": { "LOG_LEVEL": "debug" } })
        );
    }

    #[test]
    fn kubernetes_secret_values_are_base64_encoded() {
        let payload = ConfigPayloadBuilder::new(
            "db",
            ConfigSource::Secret(SecretSource::Kubernetes {
                data: data(&[("password", "hunter2")]),
            }),
        )
        .usage(Usage::Volume(
            VolumeMount::new("/etc/db")
                .with_sub_path(SubPath::PerKey)
                .with_file_permission(FilePermission::parse("400").expect("valid permission")),
        ))
        .build()
        .expect("valid payload");

        assert_eq!(payload.data.as_ref().map(|data| data["password"].as_str()), Some("aHVudGVyMg=="));
        assert_eq!(payload.usage_type, UsageType::Volume);
        assert_eq!(payload.sub_path, Some(true));
        assert_eq!(payload.file_permission.as_deref(), Some("0400"));
        assert_eq!(payload.external_type.as_deref(), Some(""));
    }

    #[test]
    fn masked_and_empty_secrets_are_refused() {
        let masked = ConfigPayloadBuilder::new(
            "db",
            ConfigSource::Secret(SecretSource::Kubernetes {
                data: data(&[("password", REDACTION_MASK)]),
            }),
        )
        .build();
        assert_eq!(masked, Err(SubmissionError::MaskedValue { key: "password".into() }));

        let empty = ConfigPayloadBuilder::new("db", ConfigSource::Secret(SecretSource::Kubernetes { data: IndexMap::new() })).build();
        assert_eq!(empty.map_err(|error| error.to_string()), Err("Please add secret data before saving.".to_string()));
    }

    #[test]
    fn sub_path_keys_only_for_external_sources() {
        let volume = Usage::Volume(VolumeMount::new("/config").with_sub_path(SubPath::Keys(vec!["a.yaml".into()])));

        let existing = ConfigPayloadBuilder::new("shared", ConfigSource::ConfigMap(ConfigMapSource::MountExisting))
            .usage(volume.clone())
            .build()
            .expect("external mount with keys");
        assert!(existing.external);
        assert_eq!(existing.data, Some(data(&[("a.yaml", "")])));

        let inline = ConfigPayloadBuilder::new(
            "local",
            ConfigSource::ConfigMap(ConfigMapSource::Inline {
                data: data(&[("a.yaml", "x: 1")]),
            }),
        )
        .usage(volume)
        .build();
        assert_eq!(inline, Err(SubmissionError::SubPathKeysRequireExternal));
    }

    #[test]
    fn eso_secret_carries_provider_and_spec() {
        let spec = EsoSpec::from_yaml(EsoProvider::AwsSecretsManager.sample_yaml()).expect("sample spec");
        let payload = ConfigPayloadBuilder::new(
            "external",
            ConfigSource::Secret(SecretSource::Eso {
                provider: EsoProvider::AwsSecretsManager,
                role_arn: Some("arn:aws:iam::1:role/r".into()),
                spec,
            }),
        )
        .build()
        .expect("valid payload");

        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["externalType"], "ESO_AWSSecretsManager");
        assert_eq!(json["roleARN"], "arn:aws:iam::1:role/r");
        assert_eq!(json["esoSecretData"]["esoData"][0]["property"], "prodPassword");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn kes_secret_requires_complete_items() {
        let payload = ConfigPayloadBuilder::new(
            "kes",
            ConfigSource::Secret(SecretSource::Kes {
                provider: KesProvider::HashiCorpVault,
                role_arn: None,
                items: vec![KesSecretItem {
                    key: "service/credentials".into(),
                    ..KesSecretItem::default()
                }],
            }),
        )
        .build();
        assert!(matches!(payload, Err(SubmissionError::SecretSpec(_))));
    }

    #[test]
    fn field_rules_apply() {
        let bad_name = ConfigPayloadBuilder::new("Bad_Name", ConfigSource::ConfigMap(ConfigMapSource::MountExisting)).build();
        assert_eq!(bad_name, Err(SubmissionError::Field(FieldError::InvalidName)));

        let bad_path = ConfigPayloadBuilder::new("ok", ConfigSource::ConfigMap(ConfigMapSource::MountExisting))
            .usage(Usage::Volume(VolumeMount::new("relative")))
            .build();
        assert_eq!(bad_path, Err(SubmissionError::Field(FieldError::InvalidMountPath)));
    }
}
