//! Results / query - filtered reads and latency aggregation (§4.9)
//!
//! Read-only filter over the local `traffic` table (written by
//! `lydian-recorder`'s sqlite sink) by `reqid` plus any subset of
//! `TrafficRecord` fields, including a timestamp range. Aggregates: count,
//! avg/min/max latency, pass/fail counts and percentages.

pub mod error;
pub mod query;

pub use error::ResultsError;
pub use query::{ResultFilter, ResultsQuery, TrafficStats, STATS_QUERY_LATENCY_SECS};
