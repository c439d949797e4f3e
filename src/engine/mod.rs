//! Container engine integration
//!
//! All reconciliation (build, pull, create, remove) is delegated to the
//! local container engine. This module detects one and drives it over
//! its CLI.

pub mod apply;
pub mod runtime;

pub use apply::{Action, ApplyReport, Engine, ReportEntry};
pub use runtime::EngineRuntime;
