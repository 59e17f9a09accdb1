//! Parsing of Key Vault object identifiers.

use url::Url;

/// Components of an object id such as
/// `https://team-kv.vault.azure.net/secrets/db-password/3f2a...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    /// `https://team-kv.vault.azure.net`
    pub vault_url: String,
    pub vault_name: String,
    /// `secrets`, `keys`, `certificates`, `deletedsecrets`, ...
    pub collection: String,
    pub name: String,
    pub version: Option<String>,
}

impl ResourceId {
    /// Returns `None` for anything that is not an absolute
    /// `https://{vault}.{dns}/{collection}/{name}[/{version}]` URL.
    pub fn parse(id: &str) -> Option<Self> {
        let url = Url::parse(id).ok()?;
        let host = url.host_str()?;
        let vault_name = host.split('.').next().filter(|s| !s.is_empty())?;

        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let collection = segments.next()?;
        let name = segments.next()?;
        let version = segments.next().map(str::to_string);

        Some(Self {
            vault_url: format!("{}://{}", url.scheme(), host),
            vault_name: vault_name.to_string(),
            collection: collection.to_string(),
            name: name.to_string(),
            version,
        })
    }
}

/// Name and version pulled from an id, tolerating ids that fail to parse.
pub(crate) fn name_and_version(id: &str) -> (Option<String>, Option<String>) {
    match ResourceId::parse(id) {
        Some(parsed) => (Some(parsed.name), parsed.version),
        None => (None, None),
    }
}
