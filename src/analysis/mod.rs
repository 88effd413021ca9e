//! Analysis pipeline.
//!
//! Fan-out to every enabled agent, all-complete join, consolidation
//! into one report, and best-effort recording.

pub mod collector;
pub mod consolidator;
pub mod dispatcher;
pub mod orchestrator;

pub use orchestrator::{Orchestration, Orchestrator};
