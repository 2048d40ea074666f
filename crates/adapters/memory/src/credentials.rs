//! Salted password hashes for the built-in auth service.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A stored login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub user_id: String,
    pub salt: String,
    pub hash: String,
}

impl StoredCredential {
    /// Hashes `password` with a fresh random salt.
    pub fn new(user_id: impl Into<String>, password: &str) -> Self {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = hex::encode(salt);
        let hash = digest(&salt, password);
        Self {
            user_id: user_id.into(),
            salt,
            hash,
        }
    }

    /// Returns true if `password` matches.
    pub fn verify(&self, password: &str) -> bool {
        digest(&self.salt, password) == self.hash
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify() {
        let cred = StoredCredential::new("u1", "hunter2");
        assert!(cred.verify("hunter2"));
        assert!(!cred.verify("hunter3"));
    }

    #[test]
    fn test_salts_differ() {
        let a = StoredCredential::new("u1", "same");
        let b = StoredCredential::new("u1", "same");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }
}
