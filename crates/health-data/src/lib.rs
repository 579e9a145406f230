//! Data layer for STORViX health.
//!
//! Parses telemetry CSV exports into record sets, narrows them by time and
//! attributes, aggregates fleet statistics, builds the status summary and
//! capacity trends, and runs the top-level analysis pipeline.

pub mod aggregator;
pub mod analysis;
pub mod filters;
pub mod reader;
pub mod summary;
pub mod trends;

pub use health_core as core;
