//! Docker Engine integration module
//!
//! Provides the engine trait, the bollard-backed client and the data types
//! returned by the tools.

pub mod client;
pub mod engine;
pub mod types;
pub mod utils;
