//! Token service: signed stateless session tokens and opaque action tokens.
//!
//! Session tokens are HS256 claims with a fixed TTL, verified by signature
//! and expiry alone. Action tokens are random strings whose validity lives in
//! the credential store; only a digest is persisted.

use anyhow::{Context, Result};
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::store::Role;

/// Claim set carried by a session token.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionTokenError {
    #[error("session token expired")]
    Expired,
    #[error("invalid session token")]
    Invalid,
}

impl From<jsonwebtoken::errors::Error> for SessionTokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid,
        }
    }
}

/// Issues and verifies session tokens with the process-wide signing key.
/// Rotating the key invalidates every outstanding session, there is no
/// revocation list.
pub struct SessionSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

impl SessionSigner {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_seconds: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// # Errors
    /// Returns an error if claim serialization or signing fails.
    pub fn issue(&self, sub: &str, email: &str, role: Role) -> Result<String> {
        self.issue_at(sub, email, role, Utc::now().timestamp())
    }

    fn issue_at(&self, sub: &str, email: &str, role: Role, issued_at: i64) -> Result<String> {
        let claims = Claims {
            sub: sub.to_string(),
            email: email.to_string(),
            role,
            iat: issued_at,
            exp: issued_at + self.ttl_seconds,
        };
        encode(&Header::default(), &claims, &self.encoding).context("failed to sign session token")
    }

    /// # Errors
    /// `Expired` when the TTL has elapsed, `Invalid` for anything else
    /// (bad signature, malformed token, wrong algorithm).
    pub fn verify(&self, token: &str) -> Result<Claims, SessionTokenError> {
        // Default validation is HS256; no leeway so the expiry boundary is
        // exact.
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

/// Create a new opaque action token for email links (verification / reset).
/// The raw value goes only to the user; the store keeps the digest.
///
/// # Errors
/// Returns an error if the system RNG fails.
pub fn generate_action_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate action token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Digest an action token for storage and lookup.
#[must_use]
pub fn hash_action_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn signer() -> SessionSigner {
        SessionSigner::new(&SecretString::from("test-secret".to_string()), 3600)
    }

    #[test]
    fn issue_verify_round_trip() -> Result<()> {
        let signer = signer();
        let token = signer.issue("42", "ana@x.com", Role::User)?;
        let claims = signer.verify(&token).map_err(anyhow::Error::new)?;
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "ana@x.com");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.exp, claims.iat + 3600);
        Ok(())
    }

    #[test]
    fn verify_after_ttl_returns_expired() -> Result<()> {
        let signer = signer();
        // Issued long enough ago that the token is past its window.
        let token = signer.issue_at("42", "ana@x.com", Role::User, Utc::now().timestamp() - 7200)?;
        assert_eq!(signer.verify(&token), Err(SessionTokenError::Expired));
        Ok(())
    }

    #[test]
    fn verify_inside_ttl_near_expiry_is_accepted() -> Result<()> {
        let signer = signer();
        // One minute of validity left (T+59min on a 1h TTL).
        let token = signer.issue_at("42", "ana@x.com", Role::User, Utc::now().timestamp() - 3540)?;
        assert!(signer.verify(&token).is_ok());
        Ok(())
    }

    #[test]
    fn verify_rejects_wrong_key() -> Result<()> {
        let token = signer().issue("42", "ana@x.com", Role::Admin)?;
        let other = SessionSigner::new(&SecretString::from("other-secret".to_string()), 3600);
        assert_eq!(other.verify(&token), Err(SessionTokenError::Invalid));
        Ok(())
    }

    #[test]
    fn verify_rejects_garbage() {
        assert_eq!(
            signer().verify("not-a-token"),
            Err(SessionTokenError::Invalid)
        );
    }

    #[test]
    fn generate_action_token_is_32_random_bytes() {
        let decoded_len = generate_action_token()
            .ok()
            .and_then(|token| URL_SAFE_NO_PAD.decode(token.as_bytes()).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn hash_action_token_stable() {
        let first = hash_action_token("token");
        let second = hash_action_token("token");
        let different = hash_action_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
    }
}
