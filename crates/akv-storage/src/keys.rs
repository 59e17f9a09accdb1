//! Storage key constants.

/// Keys written by AKV Manager.
pub struct StorageKeys;

impl StorageKeys {
    /// Current access token (sealed).
    pub const AZURE_ACCESS_TOKEN: &'static str = "azure_access_token";

    /// Current refresh token (sealed).
    pub const AZURE_REFRESH_TOKEN: &'static str = "azure_refresh_token";

    /// Signed-in user snapshot (sealed JSON).
    pub const USER_INFO: &'static str = "user_info";

    /// Full token set (sealed JSON).
    pub const AUTH_TOKENS: &'static str = "auth_tokens";

    /// Marker written on every successful login.
    pub const SESSION_KEY: &'static str = "session_key";

    /// Random secret the sealing key is derived from (base64).
    pub const STORE_KEY: &'static str = "store_key";

    /// Everything cleared on logout. The store key survives.
    pub const SESSION_ENTRIES: [&'static str; 5] = [
        Self::AZURE_ACCESS_TOKEN,
        Self::AZURE_REFRESH_TOKEN,
        Self::USER_INFO,
        Self::AUTH_TOKENS,
        Self::SESSION_KEY,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_keys_are_unique_and_exclude_store_key_from_session() {
        let mut all = StorageKeys::SESSION_ENTRIES.to_vec();
        all.push(StorageKeys::STORE_KEY);
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len(), "Storage keys must be unique");
        assert!(!StorageKeys::SESSION_ENTRIES.contains(&StorageKeys::STORE_KEY));
    }
}
