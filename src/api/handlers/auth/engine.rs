//! Credential lifecycle workflows: signup, verification, login, reset.
//!
//! Each operation validates, talks to the store, and reports a closed set of
//! outcomes. Mapping outcomes to pages and redirects is handler work, nothing
//! here touches HTTP.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use regex::Regex;
use secrecy::ExposeSecret;
use tracing::{error, info, warn};

use super::state::AuthState;
use super::store::{NewAccount, Role, StoreError};
use super::tokens::{generate_action_token, hash_action_token};
use super::types::{LoginForm, ResetPasswordForm, SignupForm};
use crate::api::email::{reset_email, verification_email, Message};

const MIN_PASSWORD_LENGTH: usize = 6;

/// Subject claim used by the environment-backed admin session, which has no
/// account row behind it.
pub(super) const ADMIN_SUBJECT: &str = "admin";

/// Lightweight email sanity check applied before touching the store.
pub(super) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

async fn hash_password(password: String, cost: u32) -> Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("hash task failed")?
        .context("failed to hash password")
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("verify task failed")?
        .context("failed to verify password")
}

#[derive(Debug, PartialEq, Eq)]
pub enum SignupOutcome {
    /// Account created, verification email on its way.
    Completed,
    /// Input rejected, the message is shown on the re-rendered form.
    Rejected(String),
    DuplicateEmail,
    Unavailable,
}

pub async fn signup(state: &AuthState, form: SignupForm) -> SignupOutcome {
    if let Err(message) = validate_signup(&form) {
        return SignupOutcome::Rejected(message);
    }

    let password_hash = match hash_password(form.password, state.config().bcrypt_cost()).await {
        Ok(hash) => hash,
        Err(err) => {
            error!("signup failed: {err:#}");
            return SignupOutcome::Unavailable;
        }
    };

    let token = match generate_action_token() {
        Ok(token) => token,
        Err(err) => {
            error!("signup failed: {err:#}");
            return SignupOutcome::Unavailable;
        }
    };

    let role = Role::parse(&form.role).unwrap_or(Role::User);
    let account = match state
        .store()
        .create(NewAccount {
            name: form.name,
            email: form.email,
            password_hash,
            role,
            verification_token: hash_action_token(&token),
        })
        .await
    {
        Ok(account) => account,
        Err(StoreError::DuplicateEmail) => return SignupOutcome::DuplicateEmail,
        Err(StoreError::Unavailable(err)) => {
            error!("signup failed: {err:#}");
            return SignupOutcome::Unavailable;
        }
    };

    info!(account.id = %account.id, "account created");

    // The account exists either way, delivery problems only cost the email.
    let message = Message {
        to: account.email.clone(),
        subject: "Verify your email".to_string(),
        html: verification_email(&account.name, &state.config().verify_url(&token)),
    };
    if let Err(err) = state.mailer().send(message).await {
        warn!(account.id = %account.id, "verification email not delivered: {err:#}");
    }

    SignupOutcome::Completed
}

fn validate_signup(form: &SignupForm) -> Result<(), String> {
    if form.name.trim().is_empty()
        || form.email.is_empty()
        || form.password.is_empty()
        || form.confirm_password.is_empty()
        || form.role.is_empty()
    {
        return Err("All fields are required".to_string());
    }
    if !valid_email(&form.email) {
        return Err("Please enter a valid email address".to_string());
    }
    if form.password.len() < MIN_PASSWORD_LENGTH {
        return Err("Password must be at least 6 characters".to_string());
    }
    if form.password != form.confirm_password {
        return Err("Passwords do not match".to_string());
    }
    if Role::parse(&form.role).is_none() {
        return Err("Invalid role".to_string());
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    /// Unknown or already consumed token.
    UnknownToken,
    Unavailable,
}

pub async fn verify_email(state: &AuthState, token: &str) -> VerifyOutcome {
    if token.is_empty() {
        return VerifyOutcome::UnknownToken;
    }

    let account = match state
        .store()
        .find_by_verification_token(&hash_action_token(token))
        .await
    {
        Ok(Some(account)) => account,
        Ok(None) => return VerifyOutcome::UnknownToken,
        Err(err) => {
            error!("verification failed: {err:#}");
            return VerifyOutcome::Unavailable;
        }
    };

    if let Err(err) = state.store().mark_verified(account.id).await {
        error!(account.id = %account.id, "verification failed: {err:#}");
        return VerifyOutcome::Unavailable;
    }

    info!(account.id = %account.id, "email verified");
    VerifyOutcome::Verified
}

#[derive(Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Session token issued; the handler sets the cookie and redirects to
    /// the role's dashboard.
    Authenticated { token: String, role: Role },
    /// One message for every failure mode so the response does not reveal
    /// whether the account exists or is unverified.
    InvalidCredentials,
    Unavailable,
}

pub async fn login(state: &AuthState, form: LoginForm) -> LoginOutcome {
    if form.email.is_empty() || form.password.is_empty() {
        return LoginOutcome::InvalidCredentials;
    }

    // Environment-backed admin, no account row involved. Only an exact
    // email and password match short-circuits; anything else falls through
    // to the store so a registered account sharing the admin email still
    // authenticates normally.
    if let (Some(admin_email), Some(admin_password)) =
        (state.config().admin_email(), state.config().admin_password())
    {
        if form.email == admin_email && form.password == admin_password.expose_secret() {
            return match state.signer().issue(ADMIN_SUBJECT, admin_email, Role::Admin) {
                Ok(token) => {
                    info!("admin session issued");
                    LoginOutcome::Authenticated {
                        token,
                        role: Role::Admin,
                    }
                }
                Err(err) => {
                    error!("login failed: {err:#}");
                    LoginOutcome::Unavailable
                }
            };
        }
    }

    let account = match state.store().find_by_email(&form.email).await {
        Ok(account) => account,
        Err(err) => {
            error!("login failed: {err:#}");
            return LoginOutcome::Unavailable;
        }
    };

    let Some(account) = account else {
        // Burn a comparison against the dummy hash so this path is not
        // observably faster than a wrong password.
        let _ = verify_password(form.password, state.dummy_hash().to_string()).await;
        return LoginOutcome::InvalidCredentials;
    };

    let matches = match verify_password(form.password, account.password_hash.clone()).await {
        Ok(matches) => matches,
        Err(err) => {
            error!(account.id = %account.id, "login failed: {err:#}");
            return LoginOutcome::Unavailable;
        }
    };

    if !matches || !account.verified {
        return LoginOutcome::InvalidCredentials;
    }

    match state
        .signer()
        .issue(&account.id.to_string(), &account.email, account.role)
    {
        Ok(token) => {
            info!(account.id = %account.id, "session issued");
            LoginOutcome::Authenticated {
                token,
                role: account.role,
            }
        }
        Err(err) => {
            error!(account.id = %account.id, "login failed: {err:#}");
            LoginOutcome::Unavailable
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ForgotPasswordOutcome {
    /// Same answer whether or not the email matched an account.
    Accepted,
    Rejected(String),
    Unavailable,
}

pub async fn forgot_password(state: &AuthState, email: &str) -> ForgotPasswordOutcome {
    if email.is_empty() || !valid_email(email) {
        return ForgotPasswordOutcome::Rejected(
            "Please enter a valid email address".to_string(),
        );
    }

    let account = match state.store().find_by_email(email).await {
        Ok(Some(account)) => account,
        // Unknown email gets the same acknowledgement as a known one.
        Ok(None) => return ForgotPasswordOutcome::Accepted,
        Err(err) => {
            error!("forgot password failed: {err:#}");
            return ForgotPasswordOutcome::Unavailable;
        }
    };

    let token = match generate_action_token() {
        Ok(token) => token,
        Err(err) => {
            error!(account.id = %account.id, "forgot password failed: {err:#}");
            return ForgotPasswordOutcome::Unavailable;
        }
    };

    let expiry = Utc::now() + Duration::seconds(state.config().reset_ttl_seconds());
    if let Err(err) = state
        .store()
        .set_reset_token(account.id, &hash_action_token(&token), expiry)
        .await
    {
        error!(account.id = %account.id, "forgot password failed: {err:#}");
        return ForgotPasswordOutcome::Unavailable;
    }

    info!(account.id = %account.id, "reset window opened");

    let message = Message {
        to: account.email.clone(),
        subject: "Reset your password".to_string(),
        html: reset_email(&account.name, &state.config().reset_url(&token)),
    };
    if let Err(err) = state.mailer().send(message).await {
        warn!(account.id = %account.id, "reset email not delivered: {err:#}");
    }

    ForgotPasswordOutcome::Accepted
}

#[derive(Debug, PartialEq, Eq)]
pub enum ResetPasswordOutcome {
    Completed,
    Rejected(String),
    /// Unknown, consumed, or expired token.
    UnknownToken,
    Unavailable,
}

pub async fn reset_password(state: &AuthState, form: ResetPasswordForm) -> ResetPasswordOutcome {
    if form.token.is_empty() {
        return ResetPasswordOutcome::UnknownToken;
    }
    if form.new_password.len() < MIN_PASSWORD_LENGTH {
        return ResetPasswordOutcome::Rejected(
            "Password must be at least 6 characters".to_string(),
        );
    }
    if form.new_password != form.confirm_password {
        return ResetPasswordOutcome::Rejected("Passwords do not match".to_string());
    }

    let account = match state
        .store()
        .find_by_reset_token(&hash_action_token(&form.token))
        .await
    {
        Ok(Some(account)) => account,
        Ok(None) => return ResetPasswordOutcome::UnknownToken,
        Err(err) => {
            error!("reset password failed: {err:#}");
            return ResetPasswordOutcome::Unavailable;
        }
    };

    let new_hash = match hash_password(form.new_password, state.config().bcrypt_cost()).await {
        Ok(hash) => hash,
        Err(err) => {
            error!(account.id = %account.id, "reset password failed: {err:#}");
            return ResetPasswordOutcome::Unavailable;
        }
    };

    // Consumes the token in the same statement as the password swap.
    if let Err(err) = state.store().update_password(account.id, &new_hash).await {
        error!(account.id = %account.id, "reset password failed: {err:#}");
        return ResetPasswordOutcome::Unavailable;
    }

    info!(account.id = %account.id, "password reset");
    ResetPasswordOutcome::Completed
}
