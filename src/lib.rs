//! # Autogate
//!
//! Authentication and credential lifecycle service for a server-rendered car
//! marketplace. It owns the account store, password hashing, stateless
//! session tokens (cookie `jwt`), single-use action tokens for email
//! verification and password reset, and role-based route protection.
//!
//! ## Token model
//!
//! - **Session tokens** are signed HS256 claims with a short TTL. There is no
//!   revocation list; rotating the signing secret invalidates every
//!   outstanding session.
//! - **Action tokens** (verification / reset) are opaque random strings whose
//!   validity is the account row itself: the store keeps a SHA-256 digest,
//!   consumption clears the column, and reset tokens additionally carry an
//!   explicit expiry. A leaked link stops working the moment it is consumed.
//!
//! ## Degrade, don't crash
//!
//! Missing mailer credentials select a log-only mailer; a missing DSN selects
//! an in-memory store. Both decisions are made once at startup.

pub mod api;
pub mod cli;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
