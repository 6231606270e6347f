//! Physical execution core for a distributed dataset engine.
//!
//! An operator DAG moves bundles of block references between transformation
//! stages. Blocks live in a distributed task runtime; the engine only ever
//! holds references plus metadata, so control-plane memory stays bounded
//! regardless of dataset size.
//!
//! The crate splits into a declarative [`logical`] plan layer, the
//! [`execution`] layer (physical operators, the exchange transforms behind
//! the all-to-all operators, the planner, and a bulk executor), the
//! [`runtime`] collaborator interfaces, and [`testutil`] doubles for driving
//! plans without a real cluster.

pub mod bundle;
pub mod config;
pub mod execution;
pub mod explain;
pub mod logical;
pub mod runtime;
pub mod testutil;
