//! # rota_core
//!
//! Token issuing, session ledger and auth orchestration for Rota.
//!
//! Leaves first: [`ledger`] records every refresh session, [`auth::jwt`]
//! mints and verifies credential pairs on top of it, and
//! [`auth::orchestrator`] exposes login / refresh / logout / logout-all.

pub mod auth;
pub mod clock;
pub mod ledger;
pub mod migrate;
pub mod models;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
