//! # Civitas Analytics Engine
//!
//! Computes the service-level KPIs of a consolidated request dataset.
//!
//! ## Architectural Principles
//!
//! - **Pure logic:** this crate has no knowledge of extracts, files or models. It reads
//!   a `CanonicalDataset` and nothing else.
//! - **Stateless calculation:** the `KpiEngine` holds only its thresholds. The same
//!   dataset and the same `now` always give the same `KpiReport`.
//! - **Total:** an empty or all-pending dataset is a valid input. Undefined values are
//!   `None` and each KPI family carries an `insufficient_data` flag.
//!
//! ## Public API
//!
//! - `KpiEngine`: the calculator.
//! - `KpiReport`: the five KPI families, serializable to JSON.
//! - `AnalyticsError`: the specific error types that can be returned from this crate.

pub mod engine;
pub mod error;
pub mod report;

pub use engine::KpiEngine;
pub use error::AnalyticsError;
pub use report::{
    AttentionTimeKpi, CategoryDemandKpi, CategoryShare, KpiReport, ResolutionRateKpi,
    TemporalTrendsKpi, WaitTimeKpi,
};
