//! # Civitas Feature Engineering
//!
//! Derives model inputs from the canonical dataset: calendar components, trailing
//! same-category demand counts and integer-encoded categorical fields.
//!
//! Encoders are fitted once (`FeatureBuilder::fit`) and travel with the trained model,
//! so prediction encodes labels exactly as training did. Labels never seen during
//! fitting encode as [`UNKNOWN_CODE`].

pub mod bucket;
pub mod builder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod rolling;
pub mod vector;

pub use bucket::{DemandBucket, daily_demand, midnight};
pub use builder::FeatureBuilder;
pub use encoder::{CategoricalEncoder, EncoderSet, UNKNOWN_CODE};
pub use error::FeatureError;
pub use frame::{frame_to_matrix, read_parquet, to_frame, to_matrix, write_parquet};
pub use rolling::{ROLLING_WINDOWS_DAYS, RollingHistory};
pub use vector::{FEATURE_COUNT, FEATURE_NAMES, FeatureSchema, FeatureVector};
