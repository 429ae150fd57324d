//! authgate — minimal authentication backend.
//!
//! Registers users, authenticates them, issues signed session tokens as
//! HttpOnly cookies, and supports a separate admin login path backed by a
//! config-held credential pair rather than a stored entity.

pub mod auth;
pub mod config;
pub mod gateway;
