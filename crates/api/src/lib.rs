//! Lifelist HTTP API.
//!
//! Read-heavy axum service over the ledger database written by the
//! `lifelist-indexer` service: proof lookups, life lists, leaderboards,
//! token metadata, and the daily streak touch.
//!
//! The service never writes to the point ledger; the only write path is the
//! streak touch, which applies the pure transition from
//! `lifelist_core::streak`.

pub mod db;
pub mod identified;
pub mod server;
