//! Memory Pressure Task
//!
//! Background task that periodically asks the optimization manager to
//! check memory usage.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::optimization::OptimizationManager;

/// Spawns the memory-pressure check loop.
///
/// Sleeps `memory_check_interval` between checks. Sweeps and their logging
/// happen inside [`OptimizationManager::check_memory_pressure`].
pub fn spawn_memory_pressure_task(manager: Arc<OptimizationManager>) -> JoinHandle<()> {
    let interval = manager.settings().memory_check_interval;

    tokio::spawn(async move {
        info!(
            threshold = manager.settings().pressure_threshold,
            "Starting memory pressure task with interval of {:?}", interval
        );

        loop {
            tokio::time::sleep(interval).await;
            manager.check_memory_pressure().await;
        }
    })
}
