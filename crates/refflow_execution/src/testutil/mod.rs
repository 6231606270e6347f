//! Test doubles for the engine's external collaborators.
//!
//! Public so downstream crates can drive plans without a real distributed
//! runtime: an in-process task runtime over plain `i64` rows, a progress
//! sink that records everything, and labeled-bundle constructors.

pub mod bundles;
pub mod progress;
pub mod runtime;
