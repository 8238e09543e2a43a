//! Hierarchical Temporal Memory (HTM) core computation.
//!
//! Two online learning stages:
//! - The [`SpatialPooler`](crate::core::spatial_pooler::SpatialPooler) turns a dense input bit-vector
//!   into a stable, sparse set of active columns, keeping every column in use through boosting.
//! - The [`TemporalMemory`](crate::core::temporal_memory::TemporalMemory) learns sequences over those
//!   column activations with per-cell dendrite segments and predicts the next step.
//!
//! Both engines own their state and their random number generator, so independent instances
//! can be run side by side and reproduced from a seed.

pub mod core;
pub mod error;

pub use error::{HtmError, Result};
