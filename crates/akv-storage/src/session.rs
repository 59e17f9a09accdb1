//! Persisted session: signed-in user plus optional tokens.

use crate::{AuthTokens, Sealer, SecureStorage, StorageKeys, StorageResult, UserInfo};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reads and writes the current session through a [`SecureStorage`]
/// backend. Every value except the store key and the session marker is
/// sealed; anything that fails to unseal is deleted and reported as absent.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn SecureStorage>,
    sealer: Sealer,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SecureStorage>) -> StorageResult<Self> {
        let sealer = Sealer::load_or_create(storage.as_ref())?;
        Ok(Self { storage, sealer })
    }

    /// Replace the stored session.
    pub fn save_session(&self, user: &UserInfo, tokens: Option<&AuthTokens>) -> StorageResult<()> {
        self.write_sealed_json(StorageKeys::USER_INFO, user)?;

        match tokens {
            Some(tokens) => {
                self.write_sealed_json(StorageKeys::AUTH_TOKENS, tokens)?;
                self.write_sealed(StorageKeys::AZURE_ACCESS_TOKEN, &tokens.access_token)?;
                match tokens.refresh_token.as_deref() {
                    Some(refresh) => self.write_sealed(StorageKeys::AZURE_REFRESH_TOKEN, refresh)?,
                    None => {
                        self.storage.delete(StorageKeys::AZURE_REFRESH_TOKEN)?;
                    }
                }
            }
            None => {
                for key in [
                    StorageKeys::AUTH_TOKENS,
                    StorageKeys::AZURE_ACCESS_TOKEN,
                    StorageKeys::AZURE_REFRESH_TOKEN,
                ] {
                    self.storage.delete(key)?;
                }
            }
        }

        self.storage
            .set(StorageKeys::SESSION_KEY, &uuid::Uuid::new_v4().to_string())?;
        debug!(user_id = %user.id, has_tokens = tokens.is_some(), "session saved");
        Ok(())
    }

    pub fn load_user(&self) -> StorageResult<Option<UserInfo>> {
        self.read_sealed_json(StorageKeys::USER_INFO)
    }

    pub fn load_tokens(&self) -> StorageResult<Option<AuthTokens>> {
        self.read_sealed_json(StorageKeys::AUTH_TOKENS)
    }

    pub fn access_token(&self) -> StorageResult<Option<String>> {
        self.read_sealed(StorageKeys::AZURE_ACCESS_TOKEN)
    }

    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.read_sealed(StorageKeys::AZURE_REFRESH_TOKEN)
    }

    /// Remove every session entry. The store key is kept.
    pub fn clear(&self) -> StorageResult<()> {
        for key in StorageKeys::SESSION_ENTRIES {
            self.storage.delete(key)?;
        }
        debug!("session cleared");
        Ok(())
    }

    /// Session marker present and unexpired tokens stored.
    pub fn is_logged_in(&self) -> StorageResult<bool> {
        if !self.storage.has(StorageKeys::SESSION_KEY)? {
            return Ok(false);
        }
        Ok(self
            .load_tokens()?
            .map(|tokens| !tokens.is_expired())
            .unwrap_or(false))
    }

    fn write_sealed(&self, key: &str, value: &str) -> StorageResult<()> {
        let blob = self.sealer.seal(value.as_bytes())?;
        self.storage.set(key, &blob)
    }

    fn write_sealed_json<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let json = serde_json::to_string(value)?;
        self.write_sealed(key, &json)
    }

    fn read_sealed(&self, key: &str) -> StorageResult<Option<String>> {
        let Some(blob) = self.storage.get(key)? else {
            return Ok(None);
        };

        let opened = self
            .sealer
            .open(&blob)
            .and_then(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|e| crate::StorageError::Encoding(e.to_string()))
            });

        match opened {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(key = %key, error = %err, "discarding unreadable stored value");
                self.storage.delete(key)?;
                Ok(None)
            }
        }
    }

    fn read_sealed_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let Some(json) = self.read_sealed(key)? else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(key = %key, error = %err, "discarding malformed stored record");
                self.storage.delete(key)?;
                Ok(None)
            }
        }
    }
}
