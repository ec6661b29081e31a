// SPDX-FileCopyrightText: 2026 Knot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stateless bearer tokens.
//!
//! Format: `<user_id>.<expires_unix>.<hex hmac-sha256 of "<user_id>.<expires_unix>">`.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use knot_core::{KnotError, TokenAuthority, UserId};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Signs and checks tokens with a shared secret.
pub struct HmacTokenAuthority {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for HmacTokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacTokenAuthority")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl HmacTokenAuthority {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, KnotError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| KnotError::Internal(format!("invalid HMAC key: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    /// Issues a token as of `now` (unix seconds).
    pub fn issue_at(&self, user_id: UserId, now: i64) -> Result<String, KnotError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = now.saturating_add(ttl);
        let payload = format!("{user_id}.{expires}");
        let signature = hex::encode(self.mac(&payload)?.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    /// Verifies a token as of `now` (unix seconds).
    pub fn verify_at(&self, token: &str, now: i64) -> Result<UserId, KnotError> {
        let malformed = || KnotError::Unauthorized("malformed token".into());

        let (payload, signature) = token.rsplit_once('.').ok_or_else(malformed)?;
        let (user, expires) = payload.split_once('.').ok_or_else(malformed)?;
        let user_id: UserId = user.parse().map_err(|_| malformed())?;
        let expires: i64 = expires.parse().map_err(|_| malformed())?;
        let signature = hex::decode(signature).map_err(|_| malformed())?;

        self.mac(payload)?
            .verify_slice(&signature)
            .map_err(|_| KnotError::Unauthorized("invalid token signature".into()))?;

        if now >= expires {
            debug!(user_id, "rejected expired token");
            return Err(KnotError::Unauthorized("token expired".into()));
        }
        Ok(user_id)
    }
}

impl TokenAuthority for HmacTokenAuthority {
    fn issue(&self, user_id: UserId) -> Result<String, KnotError> {
        self.issue_at(user_id, Utc::now().timestamp())
    }

    fn verify(&self, token: &str) -> Result<UserId, KnotError> {
        self.verify_at(token, Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> HmacTokenAuthority {
        HmacTokenAuthority::new(
            b"0123456789abcdef0123456789abcdef".to_vec(),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn issue_then_verify() {
        let auth = authority();
        let token = auth.issue(42).unwrap();
        assert_eq!(auth.verify(&token).unwrap(), 42);
    }

    #[test]
    fn expired_token_rejected() {
        let auth = authority();
        let token = auth.issue_at(42, 1_000).unwrap();
        assert_eq!(auth.verify_at(&token, 1_059).unwrap(), 42);
        assert!(matches!(
            auth.verify_at(&token, 1_060),
            Err(KnotError::Unauthorized(_))
        ));
    }

    #[test]
    fn tampered_token_rejected() {
        let auth = authority();
        let token = auth.issue_at(42, 1_000).unwrap();
        let forged = token.replacen("42.", "43.", 1);
        assert!(auth.verify_at(&forged, 1_001).is_err());
    }

    #[test]
    fn other_secret_rejected() {
        let token = authority().issue_at(1, 1_000).unwrap();
        let other = HmacTokenAuthority::new(b"another-secret-another-secret-xx".to_vec(), Duration::from_secs(60));
        assert!(other.verify_at(&token, 1_001).is_err());
    }

    #[test]
    fn malformed_tokens_rejected() {
        let auth = authority();
        for token in ["", "abc", "1.2", "x.2.00", "1.y.00", "1.2.zz"] {
            assert!(
                matches!(auth.verify_at(token, 0), Err(KnotError::Unauthorized(_))),
                "{token:?}"
            );
        }
    }
}
