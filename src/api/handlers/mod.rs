//! Route handlers for the auth service.

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod pages;
pub mod root;
