//! Shared building blocks for the page-mod workspace.
//!
//! This crate provides:
//! - YAML configuration (`Config`) and its resolved-once `ConfigCell`
//! - Declarative label predicates used to select alert rules
//! - Location parsing and host/path matching for page mods
//! - `tracing` subscriber setup with a runtime-adjustable level

pub mod cell;
pub mod config;
pub mod error;
pub mod labels;
pub mod location;
pub mod logging;

pub use cell::{load_config, ConfigCell};
pub use config::Config;
pub use error::*;
pub use labels::{LabelPredicate, LabelValue};
pub use location::{Location, LocationMatcher};
pub use logging::{LogHandle, LogLevel};
