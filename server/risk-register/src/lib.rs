//! Risk register engine: a deterministic, rule-based engineering-risk pipeline.
//!
//! Ranks churn/complexity hotspots, flags knowledge concentration per
//! directory, detects architecture drift between graph snapshots, normalizes
//! scanner findings, and consolidates all of it into one typed risk register.
//!
//! No AI, no DB, no network; every stage is a pure function of its input documents.

pub mod config;
pub mod consolidate;
pub mod drift;
pub mod engine;
pub mod error;
pub mod findings;
pub mod fingerprint;
pub mod hotspot;
pub mod input;
pub mod ownership;
pub mod types;

pub use config::{Config, GraphMode, WeightSet};
pub use engine::Engine;
pub use error::EngineError;
pub use findings::Scanner;
pub use types::{DriftOutcome, Finding, RiskRegister};
