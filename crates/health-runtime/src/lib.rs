//! Runtime layer for STORViX health.
//!
//! Fetches the telemetry export asynchronously and drives the data pipeline
//! over it.

pub mod fetcher;
pub mod orchestrator;

pub use health_core as core;
pub use health_data as data;
