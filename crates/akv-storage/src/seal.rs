//! ChaCha20-Poly1305 sealing for values written to the platform store.

use crate::{SecureStorage, StorageError, StorageKeys, StorageResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use tracing::{debug, warn};

/// Nonce size for ChaCha20-Poly1305 (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Key size for ChaCha20-Poly1305 (256 bits).
pub const KEY_SIZE: usize = 32;

const HKDF_INFO: &[u8] = b"akv-session-store-v1";

/// Seals and opens blobs of the form `base64(nonce || ciphertext)`.
#[derive(Clone)]
pub struct Sealer {
    key: [u8; KEY_SIZE],
}

impl Sealer {
    /// Derive the sealing key from a 32-byte secret.
    pub fn derive(secret: &[u8]) -> StorageResult<Self> {
        if secret.len() != KEY_SIZE {
            return Err(StorageError::Crypto(format!(
                "Invalid secret size: expected {}, got {}",
                KEY_SIZE,
                secret.len()
            )));
        }

        let hkdf = Hkdf::<Sha256>::new(None, secret);
        let mut key = [0u8; KEY_SIZE];
        hkdf.expand(HKDF_INFO, &mut key)
            .map_err(|e| StorageError::Crypto(format!("HKDF expand failed: {:?}", e)))?;

        Ok(Self { key })
    }

    /// Load the store secret from `storage`, creating one on first use.
    ///
    /// A secret that cannot be decoded is replaced, which orphans anything
    /// sealed under it.
    pub fn load_or_create(storage: &dyn SecureStorage) -> StorageResult<Self> {
        if let Some(encoded) = storage.get(StorageKeys::STORE_KEY)? {
            match BASE64.decode(encoded.trim()) {
                Ok(secret) if secret.len() == KEY_SIZE => return Self::derive(&secret),
                _ => warn!("store key is malformed, generating a new one"),
            }
        }

        let mut secret = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut secret);
        storage.set(StorageKeys::STORE_KEY, &BASE64.encode(secret))?;
        debug!("generated new store key");
        Self::derive(&secret)
    }

    pub fn seal(&self, plaintext: &[u8]) -> StorageResult<String> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|e| StorageError::Crypto(e.to_string()))?;

        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| StorageError::Crypto(e.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    pub fn open(&self, blob: &str) -> StorageResult<Vec<u8>> {
        let raw = BASE64
            .decode(blob.trim())
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        if raw.len() <= NONCE_SIZE {
            return Err(StorageError::Crypto(format!(
                "Sealed blob too short: {} bytes",
                raw.len()
            )));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_SIZE);
        let cipher = ChaCha20Poly1305::new_from_slice(&self.key)
            .map_err(|e| StorageError::Crypto(e.to_string()))?;

        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| StorageError::Crypto(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;

    fn sealer() -> Sealer {
        Sealer::derive(&[7u8; KEY_SIZE]).unwrap()
    }

    #[test]
    fn seal_open_roundtrip_uses_fresh_nonces() {
        let sealer = sealer();
        let a = sealer.seal(b"token-value").unwrap();
        let b = sealer.seal(b"token-value").unwrap();
        assert_ne!(a, b);
        assert!(!a.contains("token-value"));
        assert_eq!(sealer.open(&a).unwrap(), b"token-value");
    }

    #[test]
    fn wrong_key_fails() {
        let blob = sealer().seal(b"hello").unwrap();
        let other = Sealer::derive(&[9u8; KEY_SIZE]).unwrap();
        assert!(matches!(other.open(&blob), Err(StorageError::Crypto(_))));
    }

    #[test]
    fn tampered_or_legacy_blobs_are_rejected() {
        let sealer = sealer();
        let blob = sealer.seal(b"hello").unwrap();
        let mut raw = BASE64.decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert!(sealer.open(&BASE64.encode(raw)).is_err());

        // XOR-obfuscated payloads from older builds are plain base64 text.
        let legacy = BASE64.encode(b"\x1b\x04\x0e\x15 some legacy bytes");
        assert!(sealer.open(&legacy).is_err());
        assert!(sealer.open("not base64 at all!").is_err());
        assert!(sealer.open(&BASE64.encode([0u8; 4])).is_err());
    }

    #[test]
    fn derive_rejects_wrong_secret_size() {
        assert!(Sealer::derive(&[1u8; 16]).is_err());
    }

    #[test]
    fn load_or_create_persists_and_reuses_secret() {
        let storage = MemoryStorage::new();
        let first = Sealer::load_or_create(&storage).unwrap();
        assert!(storage.has(StorageKeys::STORE_KEY).unwrap());

        let blob = first.seal(b"persisted").unwrap();
        let second = Sealer::load_or_create(&storage).unwrap();
        assert_eq!(second.open(&blob).unwrap(), b"persisted");
    }

    #[test]
    fn malformed_store_key_is_replaced() {
        let storage = MemoryStorage::new();
        storage.set(StorageKeys::STORE_KEY, "temp").unwrap();
        Sealer::load_or_create(&storage).unwrap();

        let stored = storage.get(StorageKeys::STORE_KEY).unwrap().unwrap();
        assert_eq!(BASE64.decode(stored).unwrap().len(), KEY_SIZE);
    }
}
