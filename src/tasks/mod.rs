//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of a cache or of the
//! application context.
//!
//! # Tasks
//! - Cleanup: Removes expired and over-capacity entries at a fixed interval
//! - Persistence writer: Coalesces mutations into debounced snapshot writes
//! - Memory pressure: Samples process memory and shrinks caches under pressure

mod cleanup;
mod persist;
mod pressure;

pub use cleanup::spawn_cleanup_task;
pub use persist::{spawn_persist_task, PersistSignal};
pub use pressure::spawn_memory_pressure_task;
