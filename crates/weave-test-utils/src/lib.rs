//! Shared test fixtures for the weave-sync workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`vault`]: [`TestVault`] temporary vault with setup and assertion helpers
//! - [`ledger`]: ledgers and credentials wired up for tests

pub mod ledger;
pub mod vault;

pub use vault::{TestVault, vp};
