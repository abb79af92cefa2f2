//! Secret-specific editing: external secret providers, their YAML specs and
//! locked (masked) values.

use std::str::FromStr;

use confmap_types::{EsoDataItem, EsoSecretData, KesSecretItem, Redacted};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::codec::TextCodec;
use crate::model::KeyValueModel;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretSpecError {
    #[error("Could not parse to valid YAML: {reason}")]
    Parse { reason: String },

    #[error("Please add secret data before saving.")]
    NoData,

    #[error("Please use either esoData or esoDataFrom, not both")]
    BothDataKinds,

    #[error("Please provide esoData or esoDataFrom")]
    NoDataKind,

    #[error("Please use either secretStore or secretStoreRef, not both")]
    BothStores,

    #[error("Please provide secretStore or secretStoreRef")]
    NoStore,

    #[error("Please check key and secretKey (entry {index})")]
    IncompleteEsoItem { index: usize },

    #[error("Please check key and name (entry {index})")]
    IncompleteKesItem { index: usize },

    #[error("unknown secret provider '{0}'")]
    UnknownProvider(String),
}

impl SecretSpecError {
    fn parse(reason: impl ToString) -> Self {
        Self::Parse {
            reason: reason.to_string(),
        }
    }
}

/// Backends of the legacy Kubernetes External Secrets integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KesProvider {
    AwsSecretsManager,
    AwsSystemManager,
    HashiCorpVault,
}

impl KesProvider {
    /// Value sent as `externalType`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwsSecretsManager => "AWSSecretsManager",
            Self::AwsSystemManager => "AWSSystemManager",
            Self::HashiCorpVault => "HashiCorpVault",
        }
    }

    /// AWS backends authenticate with an IAM role.
    pub fn uses_role_arn(&self) -> bool {
        matches!(self, Self::AwsSecretsManager | Self::AwsSystemManager)
    }

    pub fn sample_yaml(&self) -> &'static str {
        KES_SAMPLE
    }
}

impl FromStr for KesProvider {
    type Err = SecretSpecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "AWSSecretsManager" => Ok(Self::AwsSecretsManager),
            "AWSSystemManager" => Ok(Self::AwsSystemManager),
            "HashiCorpVault" => Ok(Self::HashiCorpVault),
            other => Err(SecretSpecError::UnknownProvider(other.to_string())),
        }
    }
}

/// Backends of the External Secrets Operator integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EsoProvider {
    GoogleSecretsManager,
    AwsSecretsManager,
    AzureSecretsManager,
    HashiCorpVault,
}

impl EsoProvider {
    pub const ALL: [Self; 4] = [
        Self::GoogleSecretsManager,
        Self::AwsSecretsManager,
        Self::AzureSecretsManager,
        Self::HashiCorpVault,
    ];

    /// Value sent as `externalType`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleSecretsManager => "ESO_GoogleSecretsManager",
            Self::AwsSecretsManager => "ESO_AWSSecretsManager",
            Self::AzureSecretsManager => "ESO_AzureSecretsManager",
            Self::HashiCorpVault => "ESO_HashiCorpVault",
        }
    }

    /// Whether `esoData` entries may name a `property` inside the stored secret.
    pub fn supports_property(&self) -> bool {
        matches!(self, Self::AwsSecretsManager | Self::HashiCorpVault)
    }

    /// Starting document shown for an empty editor.
    pub fn sample_yaml(&self) -> &'static str {
        match self {
            Self::GoogleSecretsManager => ESO_GOOGLE_SAMPLE,
            Self::AwsSecretsManager => ESO_AWS_SAMPLE,
            Self::AzureSecretsManager => ESO_AZURE_SAMPLE,
            Self::HashiCorpVault => ESO_VAULT_SAMPLE,
        }
    }
}

impl FromStr for EsoProvider {
    type Err = SecretSpecError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str() == value)
            .ok_or_else(|| SecretSpecError::UnknownProvider(value.to_string()))
    }
}

/// Where the operator finds the backing store.
#[derive(Debug, Clone, PartialEq)]
pub enum EsoStore {
    /// Store definition embedded in the secret (`secretStore`).
    Inline(Value),
    /// Reference to a cluster store (`secretStoreRef`).
    Reference(Value),
}

/// Which keys the operator copies.
#[derive(Debug, Clone, PartialEq)]
pub enum EsoDataSource {
    /// Individual keys (`esoData`).
    Items(Vec<EsoDataItem>),
    /// Whole documents (`esoDataFrom`).
    From(Vec<Value>),
}

/// A validated External Secrets Operator spec.
#[derive(Debug, Clone, PartialEq)]
pub struct EsoSpec {
    pub store: EsoStore,
    pub data: EsoDataSource,
    pub refresh_interval: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEsoSpec {
    #[serde(default)]
    secret_store: Option<Value>,
    #[serde(default)]
    secret_store_ref: Option<Value>,
    #[serde(default)]
    eso_data: Option<Vec<EsoDataItem>>,
    #[serde(default)]
    eso_data_from: Option<Vec<Value>>,
    #[serde(default)]
    refresh_interval: Option<String>,
}

impl EsoSpec {
    /// Parses and validates the YAML typed into the secret editor.
    pub fn from_yaml(text: &str) -> Result<Self, SecretSpecError> {
        if text.trim().is_empty() {
            return Err(SecretSpecError::NoData);
        }
        let raw: Option<RawEsoSpec> = serde_yaml::from_str(text).map_err(SecretSpecError::parse)?;
        Self::validate(raw.unwrap_or_default())
    }

    /// Validates a spec received from the backend.
    pub fn from_wire(data: &EsoSecretData) -> Result<Self, SecretSpecError> {
        Self::validate(RawEsoSpec {
            secret_store: data.secret_store.clone(),
            secret_store_ref: data.secret_store_ref.clone(),
            eso_data: data.eso_data.clone(),
            eso_data_from: data.eso_data_from.clone(),
            refresh_interval: data.refresh_interval.clone(),
        })
    }

    fn validate(raw: RawEsoSpec) -> Result<Self, SecretSpecError> {
        let eso_data = raw.eso_data.filter(|items| !items.is_empty());
        let eso_data_from = raw.eso_data_from.filter(|items| !items.is_empty());
        let secret_store = raw.secret_store.filter(|value| !value.is_null());
        let secret_store_ref = raw.secret_store_ref.filter(|value| !value.is_null());

        let data = match (eso_data, eso_data_from) {
            (Some(_), Some(_)) => return Err(SecretSpecError::BothDataKinds),
            (None, None) => return Err(SecretSpecError::NoDataKind),
            (Some(items), None) => EsoDataSource::Items(items),
            (None, Some(from)) => EsoDataSource::From(from),
        };
        let store = match (secret_store, secret_store_ref) {
            (Some(_), Some(_)) => return Err(SecretSpecError::BothStores),
            (None, None) => return Err(SecretSpecError::NoStore),
            (Some(store), None) => EsoStore::Inline(store),
            (None, Some(reference)) => EsoStore::Reference(reference),
        };
        if let EsoDataSource::Items(items) = &data
            && let Some(index) = items.iter().position(|item| item.secret_key.is_empty() || item.key.is_empty())
        {
            return Err(SecretSpecError::IncompleteEsoItem { index });
        }

        Ok(Self {
            store,
            data,
            refresh_interval: raw.refresh_interval.filter(|interval| !interval.is_empty()),
        })
    }

    pub fn to_wire(&self) -> EsoSecretData {
        let (secret_store, secret_store_ref) = match &self.store {
            EsoStore::Inline(store) => (Some(store.clone()), None),
            EsoStore::Reference(reference) => (None, Some(reference.clone())),
        };
        let (eso_data, eso_data_from) = match &self.data {
            EsoDataSource::Items(items) => (Some(items.clone()), None),
            EsoDataSource::From(from) => (None, Some(from.clone())),
        };
        EsoSecretData {
            secret_store,
            secret_store_ref,
            eso_data,
            eso_data_from,
            refresh_interval: self.refresh_interval.clone(),
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_wire())
    }
}

/// Parses the KES data list typed into the secret editor.
///
/// Entries with no key, name or property are dropped; an empty document
/// yields an empty list.
pub fn parse_kes_items(text: &str) -> Result<Vec<KesSecretItem>, SecretSpecError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let items: Option<Vec<KesSecretItem>> = serde_yaml::from_str(text).map_err(SecretSpecError::parse)?;
    Ok(items
        .unwrap_or_default()
        .into_iter()
        .filter(|item| !item.key.is_empty() || !item.name.is_empty() || item.property.as_deref().is_some_and(|p| !p.is_empty()))
        .collect())
}

/// Every KES entry needs both a key and a name.
pub fn validate_kes_items(items: &[KesSecretItem]) -> Result<(), SecretSpecError> {
    if items.is_empty() {
        return Err(SecretSpecError::NoData);
    }
    match items.iter().position(|item| item.key.is_empty() || item.name.is_empty()) {
        Some(index) => Err(SecretSpecError::IncompleteKesItem { index }),
        None => Ok(()),
    }
}

/// Secret values that stay masked until fetched from the server.
#[derive(Debug, Clone, Default)]
pub struct LockedSecret {
    values: IndexMap<String, Redacted<String>>,
}

impl LockedSecret {
    /// A secret whose keys are known but whose values are all locked.
    pub fn new<K: Into<String>>(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            values: keys.into_iter().map(|key| (key.into(), Redacted::masked())).collect(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// `true` while any value is still masked.
    pub fn is_locked(&self) -> bool {
        self.values.values().any(Redacted::is_masked)
    }

    /// Rows for display; locked values show the mask.
    pub fn display_model(&self) -> KeyValueModel {
        KeyValueModel::from_pairs(self.display_pairs())
    }

    /// Text for display; locked values show the mask.
    pub fn locked_text(&self, codec: &TextCodec) -> String {
        codec.encode_mapping(&self.display_pairs().collect())
    }

    /// Replaces every value with the server's copy and returns editable rows.
    ///
    /// Keys the server no longer returns are dropped and new keys are
    /// appended. A failed fetch leaves the secret untouched.
    pub fn unlock<E>(&mut self, fetch: impl FnOnce() -> Result<IndexMap<String, String>, E>) -> Result<KeyValueModel, E> {
        let fetched = fetch()?;
        self.values.retain(|key, _| fetched.contains_key(key));
        for (key, value) in fetched {
            self.values.insert(key, Redacted::revealed(value));
        }
        debug!(keys = self.values.len(), "unlocked secret values");
        Ok(self.display_model())
    }

    /// Reveals a single value, fetching it only when still masked.
    pub fn reveal<E>(&mut self, key: &str, fetch: impl FnOnce(&str) -> Result<String, E>) -> Option<Result<&str, E>> {
        let slot = self.values.get_mut(key)?;
        Some(slot.unlock(|| fetch(key)).map(String::as_str))
    }

    /// Masks every value again.
    pub fn lock(&mut self) {
        self.values.values_mut().for_each(Redacted::lock);
    }

    fn display_pairs(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.values
            .iter()
            .map(|(key, value)| (key.clone(), value.display_text().to_string()))
    }
}

const KES_SAMPLE: &str = "\
- key: service/credentials
  name: secret-key
  property: property-name
  isBinary: true
";

const ESO_GOOGLE_SAMPLE: &str = "\
secretStore:
  gcpsm:
    auth:
      secretRef:
        secretAccessKeySecretRef:
          name: gcpsm-secret
          key: secret-access-credentials
    projectID: myProject
esoData:
- secretKey: prod-mysql-password
  key: secrets/prod-mysql-secrets
";

const ESO_AWS_SAMPLE: &str = "\
secretStore:
  aws:
    service: SecretsManager
    region: us-east-1
    auth:
      secretRef:
        accessKeyIDSecretRef:
          name: awssm-secret
          key: access-key
        secretAccessKeySecretRef:
          name: awssm-secret
          key: secret-access-key
esoData:
- secretKey: prod-mysql-password
  key: secrets/prod-mysql-secrets
  property: prodPassword
";

const ESO_AZURE_SAMPLE: &str = "\
secretStore:
  azurekv:
    tenantId: d3bc2180-xxxx-xxxx-xxxx-154105743342
    vaultUrl: https://my-keyvault-name.vault.azure.net
    authSecretRef:
      clientId:
        name: azure-secret-sp
        key: ClientID
      clientSecret:
        name: azure-secret-sp
        key: ClientSecret
esoData:
- secretKey: prod-mysql-password
  key: secrets/prod-mysql-secrets
";

const ESO_VAULT_SAMPLE: &str = "\
secretStore:
  vault:
    server: http://my.vault.server:8200
    path: secret
    version: v2
    auth:
      tokenSecretRef:
        name: vault-token
        key: token
esoData:
- secretKey: prod-mysql-password
  key: secrets/prod-mysql-secrets
  property: prodPassword
";
