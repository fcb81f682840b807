//! Domain models shared by the issuer, the ledger and the orchestrator.
//!
//! These are internal domain types, distinct from the HTTP request/response
//! shapes in `rota_api` (which use `#[serde(rename_all = "camelCase")]`).

pub mod session;
pub mod token;
pub mod user;

pub use session::{ClientMetadata, SessionRecord, SessionState};
pub use token::{AccessClaims, RefreshClaims, TokenPair};
pub use user::User;
