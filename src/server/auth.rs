//! API-key loading and generation (C8): newline-delimited key file,
//! O(1) set-membership authentication.

use std::collections::HashSet;
use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

use crate::error::ServerError;

pub struct ApiKeyStore {
    keys: HashSet<String>,
}

impl ApiKeyStore {
    /// Loads keys from `path`; if the file is missing, generates one
    /// URL-safe-base64-encoded 16-byte key and persists it there.
    pub fn load_or_generate(path: &str) -> Result<Self, ServerError> {
        if Path::new(path).exists() {
            let raw = std::fs::read_to_string(path)?;
            let keys: HashSet<String> = raw.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect();
            if keys.is_empty() {
                return Err(ServerError::ApiKeyFileUnavailable(
                    path.to_string(),
                    std::io::Error::new(std::io::ErrorKind::InvalidData, "key file is empty"),
                ));
            }
            Ok(ApiKeyStore { keys })
        } else {
            let mut bytes = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut bytes);
            let key = URL_SAFE_NO_PAD.encode(bytes);
            std::fs::write(path, format!("{key}\n"))
                .map_err(|e| ServerError::ApiKeyFileUnavailable(path.to_string(), e))?;
            let mut keys = HashSet::new();
            keys.insert(key);
            Ok(ApiKeyStore { keys })
        }
    }

    pub fn is_valid(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_and_persists_a_key_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        let store = ApiKeyStore::load_or_generate(path.to_str().unwrap()).unwrap();
        assert!(path.exists());
        let raw = std::fs::read_to_string(&path).unwrap();
        let key = raw.trim();
        assert!(store.is_valid(key));
    }

    #[test]
    fn loads_existing_keys_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        std::fs::write(&path, "key-a\nkey-b\n").unwrap();
        let store = ApiKeyStore::load_or_generate(path.to_str().unwrap()).unwrap();
        assert!(store.is_valid("key-a"));
        assert!(store.is_valid("key-b"));
        assert!(!store.is_valid("key-c"));
    }
}
