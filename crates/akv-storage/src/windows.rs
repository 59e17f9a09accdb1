//! Windows Credential Vault implementation.

use crate::{SecureStorage, StorageError, StorageResult};
use tracing::debug;
use windows::{
    core::HSTRING,
    Security::Credentials::{PasswordCredential, PasswordVault},
};

/// HRESULT for ERROR_NOT_FOUND.
const ERROR_NOT_FOUND: u32 = 0x8007_0490;

/// Password credentials under one vault resource name.
pub struct CredentialStorage {
    resource_name: String,
}

impl CredentialStorage {
    pub fn new(service_name: &str) -> StorageResult<Self> {
        let storage = Self {
            resource_name: service_name.to_string(),
        };
        storage.vault()?;
        Ok(storage)
    }

    fn vault(&self) -> StorageResult<PasswordVault> {
        PasswordVault::new().map_err(|e| {
            StorageError::Platform(format!("Failed to access Credential Vault: {}", e))
        })
    }

    fn retrieve(&self, vault: &PasswordVault, key: &str) -> StorageResult<Option<PasswordCredential>> {
        let resource = HSTRING::from(&self.resource_name);
        let user_name = HSTRING::from(key);

        match vault.Retrieve(&resource, &user_name) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) if e.code().0 as u32 == ERROR_NOT_FOUND => Ok(None),
            Err(e) => Err(StorageError::Platform(format!(
                "Failed to retrieve credential: {}",
                e
            ))),
        }
    }
}

impl SecureStorage for CredentialStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(resource = %self.resource_name, key = %key, "Setting credential");

        let vault = self.vault()?;
        self.delete(key)?;

        let credential = PasswordCredential::CreatePasswordCredential(
            &HSTRING::from(&self.resource_name),
            &HSTRING::from(key),
            &HSTRING::from(value),
        )
        .map_err(|e| StorageError::Platform(format!("Failed to create credential: {}", e)))?;

        vault
            .Add(&credential)
            .map_err(|e| StorageError::Platform(format!("Failed to add credential: {}", e)))
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        debug!(resource = %self.resource_name, key = %key, "Getting credential");

        let vault = self.vault()?;
        let Some(credential) = self.retrieve(&vault, key)? else {
            return Ok(None);
        };

        credential
            .RetrievePassword()
            .map_err(|e| StorageError::Platform(format!("Failed to retrieve password: {}", e)))?;

        let password = credential
            .Password()
            .map_err(|e| StorageError::Platform(format!("Failed to get password: {}", e)))?;

        Ok(Some(password.to_string()))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(resource = %self.resource_name, key = %key, "Deleting credential");

        let vault = self.vault()?;
        let Some(credential) = self.retrieve(&vault, key)? else {
            return Ok(false);
        };

        vault
            .Remove(&credential)
            .map_err(|e| StorageError::Platform(format!("Failed to remove credential: {}", e)))?;
        Ok(true)
    }
}
