//! Raw `az` JSON shapes and their mapping onto the public records.

use crate::resource_id::name_and_version;
use crate::types::{
    CertificateInfo, DeletedCertificateInfo, DeletedKeyInfo, DeletedSecretInfo, DeletionInfo,
    KeyInfo, ResourceAttributes, SecretInfo, Tags, VaultInfo,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AzSecret {
    id: Option<String>,
    name: Option<String>,
    content_type: Option<String>,
    attributes: Option<ResourceAttributes>,
    tags: Option<Tags>,
    managed: Option<bool>,
    value: Option<String>,
    #[serde(flatten)]
    deletion: DeletionInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AzKey {
    kid: Option<String>,
    name: Option<String>,
    key: Option<AzKeyMaterial>,
    attributes: Option<ResourceAttributes>,
    tags: Option<Tags>,
    managed: Option<bool>,
    #[serde(flatten)]
    deletion: DeletionInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzKeyMaterial {
    kid: Option<String>,
    kty: Option<String>,
    key_ops: Option<Vec<String>>,
    n: Option<String>,
    crv: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AzCertificate {
    id: Option<String>,
    name: Option<String>,
    subject: Option<String>,
    x509_thumbprint_hex: Option<String>,
    x509_thumbprint: Option<String>,
    content_type: Option<String>,
    attributes: Option<ResourceAttributes>,
    tags: Option<Tags>,
    kid: Option<String>,
    sid: Option<String>,
    policy: Option<serde_json::Value>,
    #[serde(flatten)]
    deletion: DeletionInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AzVault {
    id: String,
    name: String,
    location: Option<String>,
    resource_group: Option<String>,
    tags: Option<Tags>,
    properties: Option<AzVaultProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzVaultProperties {
    vault_uri: Option<String>,
    tenant_id: Option<String>,
    sku: Option<AzSku>,
    enable_soft_delete: Option<bool>,
    soft_delete_retention_in_days: Option<i64>,
    enable_purge_protection: Option<bool>,
    enable_rbac_authorization: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct AzSku {
    name: Option<String>,
}

/// Object names come from the id when it parses; `name` is the fallback.
fn identify(id: Option<String>, name: Option<String>) -> (String, String, Option<String>) {
    let id = id.unwrap_or_default();
    let (parsed_name, version) = name_and_version(&id);
    let name = parsed_name.or(name).unwrap_or_default();
    (id, name, version)
}

pub(crate) fn map_secret(raw: AzSecret) -> SecretInfo {
    split_secret(raw).0
}

pub(crate) fn map_deleted_secret(raw: AzSecret) -> DeletedSecretInfo {
    let (secret, deletion) = split_secret(raw);
    DeletedSecretInfo { secret, deletion }
}

fn split_secret(raw: AzSecret) -> (SecretInfo, DeletionInfo) {
    let (id, name, version) = identify(raw.id, raw.name);
    let secret = SecretInfo {
        name,
        id,
        version,
        content_type: raw.content_type,
        attributes: raw.attributes.unwrap_or_default(),
        tags: raw.tags,
        managed: raw.managed.unwrap_or(false),
        value: raw.value,
    };
    (secret, raw.deletion)
}

pub(crate) fn map_key(raw: AzKey) -> KeyInfo {
    split_key(raw).0
}

pub(crate) fn map_deleted_key(raw: AzKey) -> DeletedKeyInfo {
    let (key, deletion) = split_key(raw);
    DeletedKeyInfo { key, deletion }
}

fn split_key(raw: AzKey) -> (KeyInfo, DeletionInfo) {
    let material = raw.key;
    let kid = material
        .as_ref()
        .and_then(|m| m.kid.clone())
        .or(raw.kid);
    let (id, name, version) = identify(kid, raw.name);

    let (key_type, key_ops, curve, key_size) = match material {
        Some(m) => {
            let size = key_size(m.n.as_deref(), m.crv.as_deref());
            (m.kty, m.key_ops.unwrap_or_default(), m.crv, size)
        }
        None => (None, Vec::new(), None, None),
    };

    let key = KeyInfo {
        name,
        id,
        version,
        key_type,
        key_size,
        curve,
        key_ops,
        attributes: raw.attributes.unwrap_or_default(),
        tags: raw.tags,
        managed: raw.managed.unwrap_or(false),
    };
    (key, raw.deletion)
}

/// Bit length from the base64url RSA modulus, or the EC curve size.
fn key_size(modulus: Option<&str>, curve: Option<&str>) -> Option<u32> {
    if let Some(n) = modulus.filter(|n| !n.is_empty()) {
        let chars = n.trim_end_matches('=').len() as u32;
        return Some(chars * 3 / 4 * 8);
    }
    match curve? {
        "P-256" | "P-256K" => Some(256),
        "P-384" => Some(384),
        "P-521" => Some(521),
        _ => None,
    }
}

pub(crate) fn map_certificate(raw: AzCertificate) -> CertificateInfo {
    split_certificate(raw).0
}

pub(crate) fn map_deleted_certificate(raw: AzCertificate) -> DeletedCertificateInfo {
    let (certificate, deletion) = split_certificate(raw);
    DeletedCertificateInfo {
        certificate,
        deletion,
    }
}

fn split_certificate(raw: AzCertificate) -> (CertificateInfo, DeletionInfo) {
    let (id, name, version) = identify(raw.id, raw.name);

    // `list` reports an empty subject; `show` carries it inside the policy.
    let subject = raw.subject.filter(|s| !s.is_empty()).or_else(|| {
        raw.policy
            .as_ref()
            .and_then(|p| p.pointer("/x509CertificateProperties/subject"))
            .and_then(|s| s.as_str())
            .map(str::to_string)
    });

    let certificate = CertificateInfo {
        name,
        id,
        version,
        subject,
        thumbprint: raw.x509_thumbprint_hex.or(raw.x509_thumbprint),
        content_type: raw.content_type,
        attributes: raw.attributes.unwrap_or_default(),
        tags: raw.tags,
        key_id: raw.kid,
        secret_id: raw.sid,
        policy: raw.policy,
    };
    (certificate, raw.deletion)
}

pub(crate) fn map_vault(raw: AzVault) -> VaultInfo {
    let resource_group = raw
        .resource_group
        .or_else(|| resource_group_from_arm_id(&raw.id));
    let props = raw.properties;

    VaultInfo {
        name: raw.name,
        location: raw.location,
        resource_group,
        vault_uri: props.as_ref().and_then(|p| p.vault_uri.clone()),
        tenant_id: props.as_ref().and_then(|p| p.tenant_id.clone()),
        sku: props
            .as_ref()
            .and_then(|p| p.sku.as_ref())
            .and_then(|s| s.name.clone()),
        soft_delete_enabled: props.as_ref().and_then(|p| p.enable_soft_delete),
        soft_delete_retention_days: props.as_ref().and_then(|p| p.soft_delete_retention_in_days),
        purge_protection_enabled: props.as_ref().and_then(|p| p.enable_purge_protection),
        rbac_authorization_enabled: props.as_ref().and_then(|p| p.enable_rbac_authorization),
        tags: raw.tags,
        id: raw.id,
    }
}

/// `/subscriptions/{sub}/resourceGroups/{rg}/providers/...` -> `{rg}`
fn resource_group_from_arm_id(id: &str) -> Option<String> {
    let mut segments = id.split('/');
    segments.find(|s| s.eq_ignore_ascii_case("resourceGroups"))?;
    segments.next().filter(|s| !s.is_empty()).map(str::to_string)
}
