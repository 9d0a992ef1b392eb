//! # Civitas Ingestion
//!
//! Turns raw extracts from the three operational systems into one canonical dataset.
//!
//! ## Pipeline
//!
//! 1. `extract`: each source is dumped to a CSV extract, read into [`RawRecord`]s.
//! 2. `adapter`: a [`SourceAdapter`] renames one source's native columns onto the
//!    canonical field set. It never looks at more than one record.
//! 3. `consolidation`: the [`ConsolidationEngine`] parses, validates, normalizes and
//!    deduplicates every adapted stream. Malformed records are quarantined with a
//!    [`ReasonCode`] instead of aborting the run.
//! 4. `export`: canonical and rejected records are written back out as CSV.
//!
//! [`RawRecord`]: core_types::RawRecord

pub mod adapter;
pub mod consolidation;
pub mod error;
pub mod export;
pub mod extract;

pub use adapter::{AdaptedStream, RecordAdapter, RejectedRecord, SourceAdapter};
pub use consolidation::{ConsolidationEngine, ConsolidationOptions, ConsolidationOutcome};
pub use error::{IngestionError, ReasonCode, RecordError};
pub use export::{
    RejectionSummary, read_canonical_csv, write_canonical_csv, write_rejected_csv,
    write_rejection_summary,
};
pub use extract::{ExtractResult, extract_all, read_csv_extract};
