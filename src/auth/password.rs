use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::Arc;
use tokio::task;
use tracing::warn;

use crate::auth::AuthError;
use crate::config::SecurityConfig;

/// One-way password hashing with a null-safe comparison.
pub trait PasswordEncoder: Send + Sync {
    fn hash(&self, raw: &str) -> Result<String>;

    /// `false` whenever `stored` is absent or empty, without touching the hash function.
    fn matches(&self, raw: &str, stored: Option<&str>) -> bool;
}

/// Argon2id encoder. Verification reads parameters from the stored PHC string,
/// so hashes made with older parameters keep verifying after a config change.
pub struct Argon2PasswordEncoder {
    params: Params,
}

impl Argon2PasswordEncoder {
    pub fn new(config: &SecurityConfig) -> Result<Self> {
        let params = Params::new(
            config.argon2_memory_cost_kib,
            config.argon2_time_cost,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;

        Ok(Self { params })
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordEncoder for Argon2PasswordEncoder {
    fn hash(&self, raw: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .hasher()
            .hash_password(raw.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

        Ok(hash.to_string())
    }

    fn matches(&self, raw: &str, stored: Option<&str>) -> bool {
        let Some(stored) = stored.filter(|s| !s.is_empty()) else {
            return false;
        };

        if raw.is_empty() {
            return false;
        }

        let parsed = match PasswordHash::new(stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Stored password hash is not a valid PHC string");
                return false;
            }
        };

        // Digest comparison inside verify_password is constant time
        self.hasher()
            .verify_password(raw.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Run [`PasswordEncoder::matches`] off the async runtime; Argon2 is CPU- and memory-heavy.
pub async fn matches_blocking(
    encoder: Arc<dyn PasswordEncoder>,
    raw: &str,
    stored: Option<&str>,
) -> Result<bool, AuthError> {
    let raw = raw.to_string();
    let stored = stored.map(str::to_string);

    task::spawn_blocking(move || encoder.matches(&raw, stored.as_deref()))
        .await
        .context("Password verification task panicked")
        .map_err(|e| AuthError::Internal(format!("{e:#}")))
}

/// Hash off the async runtime.
pub async fn hash_blocking(encoder: Arc<dyn PasswordEncoder>, raw: &str) -> Result<String> {
    let raw = raw.to_string();

    task::spawn_blocking(move || encoder.hash(&raw))
        .await
        .context("Password hashing task panicked")?
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Cheap parameters so tests stay fast.
    pub(crate) fn test_encoder() -> Argon2PasswordEncoder {
        let config = SecurityConfig {
            argon2_memory_cost_kib: 256,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        };
        Argon2PasswordEncoder::new(&config).unwrap()
    }

    #[test]
    fn empty_stored_hash_never_matches() {
        let encoder = test_encoder();
        for raw in ["", "password", " ", "\0"] {
            assert!(!encoder.matches(raw, Some("")), "matched {raw:?} against empty");
            assert!(!encoder.matches(raw, None), "matched {raw:?} against none");
        }
    }

    #[test]
    fn correct_password_matches_and_wrong_one_does_not() {
        let encoder = test_encoder();
        let hash = encoder.hash("tasting-menu").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(encoder.matches("tasting-menu", Some(&hash)));
        assert!(!encoder.matches("tasting-menu!", Some(&hash)));
    }

    #[test]
    fn empty_raw_password_is_rejected_against_real_hash() {
        let encoder = test_encoder();
        let hash = encoder.hash("").unwrap();

        // Even a hash of the empty string does not admit an empty attempt
        assert!(!encoder.matches("", Some(&hash)));
    }

    #[test]
    fn malformed_hash_does_not_match() {
        let encoder = test_encoder();
        assert!(!encoder.matches("secret", Some("not-a-phc-string")));
    }

    #[test]
    fn hashes_from_other_params_still_verify() {
        let strong = Argon2PasswordEncoder::new(&SecurityConfig {
            argon2_memory_cost_kib: 512,
            argon2_time_cost: 2,
            ..SecurityConfig::default()
        })
        .unwrap();
        let hash = strong.hash("braise").unwrap();

        assert!(test_encoder().matches("braise", Some(&hash)));
    }

    #[tokio::test]
    async fn blocking_helpers_round_trip() {
        let encoder: Arc<dyn PasswordEncoder> = Arc::new(test_encoder());
        let hash = hash_blocking(encoder.clone(), "mise-en-place").await.unwrap();

        assert!(
            matches_blocking(encoder.clone(), "mise-en-place", Some(&hash))
                .await
                .unwrap()
        );
        assert!(!matches_blocking(encoder, "mise-en-place", Some("")).await.unwrap());
    }
}
