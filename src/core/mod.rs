//! Core types shared by every sandbox strategy.
//!
//! Error taxonomy, wire models and the constants that name tools, binaries
//! and environment variables.

pub mod constants;
pub mod errors;
pub mod models;
