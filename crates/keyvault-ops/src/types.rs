use crate::status::ResourceStatus;
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

pub type Tags = HashMap<String, String>;

/// Lifecycle attributes shared by secrets, keys and certificates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAttributes {
    #[serde(default = "enabled_default", deserialize_with = "null_as_enabled")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt", skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt", skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt", skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt", skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recoverable_days: Option<i64>,
}

fn enabled_default() -> bool {
    true
}

fn null_as_enabled<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

impl Default for ResourceAttributes {
    fn default() -> Self {
        Self {
            enabled: true,
            created: None,
            updated: None,
            expires: None,
            not_before: None,
            recovery_level: None,
            recoverable_days: None,
        }
    }
}

impl ResourceAttributes {
    pub fn status(&self) -> ResourceStatus {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> ResourceStatus {
        ResourceStatus::derive(self.enabled, self.expires, self.not_before, now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultInfo {
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_delete_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_delete_retention_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purge_protection_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rbac_authorization_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretInfo {
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub attributes: ResourceAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    /// Backs a certificate; cannot be edited directly.
    #[serde(default)]
    pub managed: bool,
    /// Only populated by `show`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl SecretInfo {
    pub fn status(&self) -> ResourceStatus {
        self.attributes.status()
    }
}

impl fmt::Debug for SecretInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretInfo")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("version", &self.version)
            .field("content_type", &self.content_type)
            .field("attributes", &self.attributes)
            .field("tags", &self.tags)
            .field("managed", &self.managed)
            .field("value", &self.value.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// `RSA`, `RSA-HSM`, `EC`, `EC-HSM`, `oct-HSM`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
    #[serde(default)]
    pub key_ops: Vec<String>,
    #[serde(default)]
    pub attributes: ResourceAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(default)]
    pub managed: bool,
}

impl KeyInfo {
    pub fn status(&self) -> ResourceStatus {
        self.attributes.status()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Hex SHA-1 thumbprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub attributes: ResourceAttributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<serde_json::Value>,
}

impl CertificateInfo {
    pub fn status(&self) -> ResourceStatus {
        self.attributes.status()
    }
}

/// Soft-delete bookkeeping attached to a deleted object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_id: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt", skip_serializing_if = "Option::is_none")]
    pub deleted_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt", skip_serializing_if = "Option::is_none")]
    pub scheduled_purge_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedSecretInfo {
    #[serde(flatten)]
    pub secret: SecretInfo,
    #[serde(flatten)]
    pub deletion: DeletionInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedKeyInfo {
    #[serde(flatten)]
    pub key: KeyInfo,
    #[serde(flatten)]
    pub deletion: DeletionInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCertificateInfo {
    #[serde(flatten)]
    pub certificate: CertificateInfo,
    #[serde(flatten)]
    pub deletion: DeletionInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUser {
    pub name: String,
    #[serde(rename = "type", default)]
    pub user_type: Option<String>,
}

/// One subscription as reported by `az account show|list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    /// Subscription id.
    pub id: String,
    pub name: String,
    pub tenant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AccountUser>,
}

/// Directory object of the signed-in principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedInUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_principal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub id: String,
    pub role_definition_name: String,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VaultSku {
    #[default]
    Standard,
    Premium,
}

impl VaultSku {
    pub fn as_str(&self) -> &'static str {
        match self {
            VaultSku::Standard => "standard",
            VaultSku::Premium => "premium",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VaultCreateInput {
    pub name: String,
    pub resource_group: String,
    pub location: String,
    pub sku: VaultSku,
    pub enable_rbac_authorization: bool,
    pub enable_purge_protection: bool,
    /// Soft-delete retention, 7-90 days.
    pub retention_days: Option<u32>,
    pub tags: Tags,
}

#[derive(Clone, Default)]
pub struct SecretSetInput {
    pub vault: String,
    pub name: String,
    pub value: String,
    pub content_type: Option<String>,
    pub enabled: Option<bool>,
    pub expires: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
    pub tags: Tags,
}

impl fmt::Debug for SecretSetInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretSetInput")
            .field("vault", &self.vault)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("content_type", &self.content_type)
            .field("enabled", &self.enabled)
            .field("expires", &self.expires)
            .field("not_before", &self.not_before)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Partial update for `set-attributes`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct AttributesUpdate {
    pub version: Option<String>,
    pub enabled: Option<bool>,
    pub expires: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
    /// Secrets only.
    pub content_type: Option<String>,
    /// Keys only.
    pub key_ops: Option<Vec<String>>,
    pub tags: Option<Tags>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyType {
    #[default]
    Rsa,
    RsaHsm,
    Ec,
    EcHsm,
    OctHsm,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Rsa => "RSA",
            KeyType::RsaHsm => "RSA-HSM",
            KeyType::Ec => "EC",
            KeyType::EcHsm => "EC-HSM",
            KeyType::OctHsm => "oct-HSM",
        }
    }

    pub fn is_rsa(&self) -> bool {
        matches!(self, KeyType::Rsa | KeyType::RsaHsm)
    }

    pub fn is_ec(&self) -> bool {
        matches!(self, KeyType::Ec | KeyType::EcHsm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCurve {
    P256,
    P256K,
    P384,
    P521,
}

impl KeyCurve {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyCurve::P256 => "P-256",
            KeyCurve::P256K => "P-256K",
            KeyCurve::P384 => "P-384",
            KeyCurve::P521 => "P-521",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyCreateInput {
    pub vault: String,
    pub name: String,
    pub key_type: KeyType,
    /// RSA only; defaults to 2048.
    pub size: Option<u32>,
    /// EC only.
    pub curve: Option<KeyCurve>,
    pub ops: Vec<String>,
    pub enabled: Option<bool>,
    pub expires: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default)]
pub struct CertificateCreateInput {
    pub vault: String,
    pub name: String,
    /// Issuance policy JSON. The vault's default policy is used when absent.
    pub policy: Option<serde_json::Value>,
    pub enabled: Option<bool>,
    pub tags: Tags,
}

#[derive(Clone, Default)]
pub struct CertificateImportInput {
    pub vault: String,
    pub name: String,
    /// PEM or PFX bundle.
    pub file: PathBuf,
    pub password: Option<String>,
    pub enabled: Option<bool>,
    pub tags: Tags,
}

impl fmt::Debug for CertificateImportInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateImportInput")
            .field("vault", &self.vault)
            .field("name", &self.name)
            .field("file", &self.file)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("enabled", &self.enabled)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Pending or finished issuance returned by `certificate create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateOperation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `inProgress`, `completed`, `cancelled` or `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_requested: Option<bool>,
}

impl CertificateOperation {
    pub fn is_completed(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("completed"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertificateEncoding {
    #[default]
    Pem,
    Der,
}

impl CertificateEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateEncoding::Pem => "PEM",
            CertificateEncoding::Der => "DER",
        }
    }
}
