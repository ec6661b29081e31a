// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id password hashing in PHC string format.

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use knot_core::{KnotError, PasswordHasher};
use rand::RngCore;

/// Argon2id hasher. Parameters are embedded in each hash, so changing them
/// does not invalidate stored passwords.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Default for Argon2Hasher {
    /// OWASP baseline: 19 MiB, 2 iterations, 1 lane.
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Argon2Hasher {
    /// Custom cost parameters (memory in KiB).
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, KnotError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| KnotError::Config(format!("invalid Argon2id parameters: {e}")))?;
        Ok(Self { params })
    }

    /// Cheapest valid parameters. For tests only.
    pub fn insecure_fast() -> Self {
        Self {
            params: Params::new(Params::MIN_M_COST, Params::MIN_T_COST, 1, None)
                .unwrap_or_default(),
        }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, KnotError> {
        let mut salt_bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| KnotError::Internal(format!("failed to encode salt: {e}")))?;
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| KnotError::Internal(format!("password hashing failed: {e}")))
    }

    fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored_hash) else {
            return false;
        };
        // Verification reads the parameters from the hash itself.
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hasher = Argon2Hasher::insecure_fast();
        let hash = hasher.hash("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", &hash));
        assert!(!hasher.verify("wrong horse", &hash));
    }

    #[test]
    fn salts_differ() {
        let hasher = Argon2Hasher::insecure_fast();
        assert_ne!(hasher.hash("pw").unwrap(), hasher.hash("pw").unwrap());
    }

    #[test]
    fn malformed_hash_fails_closed() {
        assert!(!Argon2Hasher::default().verify("pw", "not-a-phc-string"));
    }

    #[test]
    fn rejects_invalid_params() {
        assert!(Argon2Hasher::with_params(1, 0, 0).is_err());
    }
}
