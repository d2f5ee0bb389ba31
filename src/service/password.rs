//! Argon2id password hashing.
//!
//! Hashes are PHC strings, so verification reads its cost parameters from the
//! stored hash and keeps working after the configured cost changes.

use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use password_hash::{PasswordHash, SaltString};
use tracing::warn;

use crate::config::Config;
use crate::error::PortalError;

#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    params: Params,
}

impl CredentialVerifier {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, PortalError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)?;
        Ok(Self { params })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, PortalError> {
        Self::new(
            cfg.argon2_memory_kib,
            cfg.argon2_iterations,
            cfg.argon2_parallelism,
        )
    }

    /// Salted Argon2id hash of `password`, computed off the async runtime.
    pub async fn hash(&self, password: &str) -> Result<String, PortalError> {
        let params = self.params.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hash_password(&params, &password)).await?
    }

    /// False on mismatch and on any malformed stored hash.
    pub async fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let password = password.to_owned();
        let stored_hash = stored_hash.to_owned();
        match tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash)).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "password verification task failed");
                false
            }
        }
    }
}

fn hash_password(params: &Params, password: &str) -> Result<String, PortalError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| PortalError::PasswordHash(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes)?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone());
    let phc = argon2.hash_password(password.as_bytes(), &salt)?.to_string();
    Ok(phc)
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> CredentialVerifier {
        CredentialVerifier::new(1024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn verifies_only_the_hashed_password() {
        let verifier = cheap();
        let hash = verifier.hash("pw1").await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verifier.verify("pw1", &hash).await);
        assert!(!verifier.verify("pw2", &hash).await);
    }

    #[tokio::test]
    async fn hashes_are_salted() {
        let verifier = cheap();
        let a = verifier.hash("same").await.unwrap();
        let b = verifier.hash("same").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn malformed_hash_is_a_mismatch() {
        let verifier = cheap();
        assert!(!verifier.verify("pw", "not-a-phc-string").await);
        assert!(!verifier.verify("pw", "").await);
    }
}
