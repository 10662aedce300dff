//! Auth state and configuration shared across handlers.

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;

use super::store::CredentialStore;
use super::tokens::SessionSigner;
use crate::api::email::Mailer;

const DEFAULT_RESET_TTL_SECONDS: i64 = 60 * 60;

/// Fixed input for the dummy hash used to equalize login timing when the
/// email does not match any account.
const DUMMY_PASSWORD: &str = "autogate-dummy-password";

#[derive(Clone, Debug)]
/// Session lifetime lives on the `SessionSigner`; the cookie Max-Age is
/// derived from it so the two never disagree.
pub struct AuthConfig {
    base_url: String,
    reset_ttl_seconds: i64,
    bcrypt_cost: u32,
    admin_email: Option<String>,
    admin_password: Option<SecretString>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            reset_ttl_seconds: DEFAULT_RESET_TTL_SECONDS,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            admin_email: None,
            admin_password: None,
        }
    }

    #[must_use]
    pub fn with_reset_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    #[must_use]
    pub fn with_admin_credentials(mut self, email: String, password: SecretString) -> Self {
        self.admin_email = Some(email);
        self.admin_password = Some(password);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(super) fn reset_ttl_seconds(&self) -> i64 {
        self.reset_ttl_seconds
    }

    pub(super) fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }

    pub(super) fn admin_email(&self) -> Option<&str> {
        self.admin_email.as_deref()
    }

    pub(super) fn admin_password(&self) -> Option<&SecretString> {
        self.admin_password.as_ref()
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Absolute link placed in the verification email.
    #[must_use]
    pub fn verify_url(&self, token: &str) -> String {
        format!("{}/verify-email?token={token}", self.base_url)
    }

    /// Absolute link placed in the password reset email.
    #[must_use]
    pub fn reset_url(&self, token: &str) -> String {
        format!("{}/reset-password?token={token}", self.base_url)
    }
}

pub struct AuthState {
    config: AuthConfig,
    store: CredentialStore,
    signer: SessionSigner,
    mailer: Mailer,
    dummy_hash: String,
}

impl AuthState {
    /// # Errors
    /// Returns an error if the dummy hash cannot be computed.
    pub fn new(
        config: AuthConfig,
        store: CredentialStore,
        signer: SessionSigner,
        mailer: Mailer,
    ) -> Result<Arc<Self>> {
        let dummy_hash = bcrypt::hash(DUMMY_PASSWORD, config.bcrypt_cost())
            .context("failed to compute dummy hash")?;
        Ok(Arc::new(Self {
            config,
            store,
            signer,
            mailer,
            dummy_hash,
        }))
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    #[must_use]
    pub fn signer(&self) -> &SessionSigner {
        &self.signer
    }

    #[must_use]
    pub fn mailer(&self) -> &Mailer {
        &self.mailer
    }

    /// Hash compared against when the email matches no account, so the
    /// missing-account path costs the same as a real comparison.
    pub(super) fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }
}
