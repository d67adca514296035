//! Stable anonymous client identity.
//!
//! The dashboard keys saved keyword selections by an opaque id that lives in
//! a small local file. The file is tagged with an HMAC so a hand-edited or
//! corrupted id is replaced rather than silently reused. This only gives
//! continuity between sessions; it is not an access-control mechanism.

use crate::error::{ConfigError, CoreError};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct IdentityFile {
    user_id: String,
    tag: String,
}

pub struct IdentityStore {
    path: PathBuf,
    secret: Vec<u8>,
}

impl IdentityStore {
    pub fn new(path: impl Into<PathBuf>, secret: &str) -> Result<Self, ConfigError> {
        if secret.is_empty() {
            return Err(ConfigError::InvalidIdentitySecret);
        }
        Ok(Self {
            path: path.into(),
            secret: secret.as_bytes().to_vec(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored identity, or generates and persists a new one when
    /// the file is missing, unreadable or fails verification.
    pub fn load_or_create(&self) -> Result<ClientIdentity, CoreError> {
        match self.load() {
            Ok(Some(identity)) => return Ok(identity),
            Ok(None) => info!("No client identity found, generating one"),
            Err(e) => warn!(
                "Discarding unreadable client identity at {}: {}",
                self.path.display(),
                e
            ),
        }

        let identity = ClientIdentity {
            user_id: uuid::Uuid::new_v4().to_string(),
        };
        self.save(&identity)?;
        Ok(identity)
    }

    fn load(&self) -> Result<Option<ClientIdentity>, CoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let file: IdentityFile = serde_json::from_str(&raw)?;

        let tag = hex::decode(&file.tag).map_err(|e| CoreError::InvalidInput {
            message: format!("identity tag is not hex: {e}"),
        })?;
        let mut mac = self.mac()?;
        mac.update(file.user_id.as_bytes());
        if mac.verify_slice(&tag).is_err() {
            warn!("Client identity signature mismatch");
            return Ok(None);
        }

        Ok(Some(ClientIdentity {
            user_id: file.user_id,
        }))
    }

    fn save(&self, identity: &ClientIdentity) -> Result<(), CoreError> {
        let mut mac = self.mac()?;
        mac.update(identity.user_id.as_bytes());
        let file = IdentityFile {
            user_id: identity.user_id.clone(),
            tag: hex::encode(mac.finalize().into_bytes()),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        info!("Saved client identity to {}", self.path.display());
        Ok(())
    }

    fn mac(&self) -> Result<HmacSha256, CoreError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| CoreError::Config(ConfigError::InvalidIdentitySecret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("reddit_monitor_identity_{}", uuid::Uuid::new_v4()))
            .join("identity.json")
    }

    #[test]
    fn test_identity_is_stable_across_loads() {
        let path = temp_path();
        let store = IdentityStore::new(&path, "secret").unwrap();
        let first = store.load_or_create().unwrap();
        let second = store.load_or_create().unwrap();
        assert_eq!(first, second);
        assert!(uuid::Uuid::parse_str(&first.user_id).is_ok());
    }

    #[test]
    fn test_tampered_identity_is_replaced() {
        let path = temp_path();
        let store = IdentityStore::new(&path, "secret").unwrap();
        let original = store.load_or_create().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let tampered = raw.replace(&original.user_id, "someone-else");
        std::fs::write(&path, tampered).unwrap();

        let replaced = store.load_or_create().unwrap();
        assert_ne!(replaced.user_id, "someone-else");
        assert_ne!(replaced, original);
    }

    #[test]
    fn test_other_secret_does_not_verify() {
        let path = temp_path();
        let original = IdentityStore::new(&path, "secret-a")
            .unwrap()
            .load_or_create()
            .unwrap();
        let other = IdentityStore::new(&path, "secret-b")
            .unwrap()
            .load_or_create()
            .unwrap();
        assert_ne!(original, other);
    }

    #[test]
    fn test_garbage_file_is_replaced() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        let store = IdentityStore::new(&path, "secret").unwrap();
        assert!(store.load_or_create().is_ok());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            IdentityStore::new(temp_path(), ""),
            Err(ConfigError::InvalidIdentitySecret)
        ));
    }
}
