//! Page-mod activation and reconciliation runtime.
//!
//! This crate provides:
//! - `HostDocument`, the document abstraction, and an in-memory implementation
//! - `wait_until` / `wait_for_element` one-shot watchers
//! - `ActionScheduler`, debounced re-application of idempotent actions
//! - `PageModule` plus per-activation `ModuleInstance` lifecycle
//! - `ModuleRouter`, location-driven activation with one instance per kind

pub mod dom;
pub mod module;
pub mod router;
pub mod scheduler;
pub mod settings;
pub mod wait;

pub use dom::{DocumentChange, DomError, ElementId, ElementSpec, HostDocument, MemoryDocument, ReadyState, Selector};
pub use module::{ModuleContext, ModuleDescriptor, ModuleError, ModuleInstance, ModuleKind, PageModule, Phase};
pub use router::{ModuleRouter, RouterError, Transition};
pub use scheduler::{ActionScheduler, ReconcileAction};
pub use settings::RuntimeSettings;
pub use wait::{wait_for_element, wait_until, WaitError};
