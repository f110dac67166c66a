//! Core business logic for honk-rs.
//!
//! The honking version cache (recompute, orchestration on vote mutations,
//! consistency verification, backfill) and the vote service that owns the
//! transaction boundary around ledger writes.

pub mod services;

pub use services::*;

/// Generate a unique ID using ULID.
#[must_use]
pub fn generate_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}
