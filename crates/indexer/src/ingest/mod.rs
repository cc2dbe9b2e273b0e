//! Event ingestion: raw payloads, normalization, and the two adapters.

pub mod backfill;
pub mod event;
pub mod processor;
pub mod stream;

pub use backfill::BackfillAdapter;
pub use event::RawAssetEvent;
pub use processor::{ApplyOutcome, BatchSummary, EventProcessor};
pub use stream::StreamAdapter;
