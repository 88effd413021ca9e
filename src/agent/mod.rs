//! Specialist agents.
//!
//! This module provides the registry of configured agents and the client
//! contract used to call them.

pub mod client;
pub mod registry;

pub use client::AgentClient;
pub use registry::AgentRegistry;
