//! Optimization Module
//!
//! Memory sampling and the manager that coordinates prefetching, image
//! resolution and pressure relief across the cache namespaces.

mod manager;
mod memory;

pub use manager::{OptimizationManager, PressureRelief, CRITICAL_PRIORITY};
pub use memory::{FixedMemorySampler, MemorySampler, MemorySample, ProcessMemorySampler};
