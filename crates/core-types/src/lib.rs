pub mod enums;
pub mod error;
pub mod raw;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{RequestStatus, SourceKind};
pub use error::CoreError;
pub use raw::{RawRecord, RawValue};
pub use structs::{CanonicalDataset, CanonicalRecord, IntermediateRecord};
