//! Core types and scoring for STORViX health.
//!
//! Holds the telemetry record model, the relative and absolute health
//! scoring models, timestamp handling, CLI settings and the shared error
//! type used by the data and runtime layers.

pub mod clock;
pub mod enhanced;
pub mod error;
pub mod formatting;
pub mod models;
pub mod scoring;
pub mod settings;
pub mod time_utils;
