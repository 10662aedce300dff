//! Credential lifecycle: store, tokens, workflows, guards, and the handlers
//! that expose them as server-rendered pages.

pub mod engine;
pub mod guard;
pub mod login;
pub mod password;
pub mod session;
pub mod signup;
pub mod state;
pub mod store;
pub mod tokens;
pub mod types;
pub mod verification;
