//! Lifelist indexer library.
//!
//! Ingests collectible transfer and sale events from the marketplace APIs,
//! scores identifications, and maintains the per-season point ledger and
//! daily streak state in SQLite.
//!
//! The binary in `main.rs` wires the pieces together; the HTTP API is served
//! by the separate `lifelist-api` service over the same database.

pub mod config;
pub mod ingest;
pub mod storage;
