//! Memory Sampling
//!
//! Process memory readings used as the cache-pressure signal.

use std::fmt;
use std::sync::Mutex;

use sysinfo::{Pid, System};

/// One memory reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub limit_bytes: u64,
}

impl MemorySample {
    /// `used / limit`, 0.0 when the limit is unknown.
    pub fn usage_ratio(&self) -> f64 {
        if self.limit_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.limit_bytes as f64
        }
    }
}

/// Source of memory readings. `None` means no reading is available.
pub trait MemorySampler: Send + Sync {
    fn sample(&self) -> Option<MemorySample>;
}

// == Process Memory Sampler ==
/// Resident memory of this process against a fixed budget, via sysinfo.
///
/// Falls back to system-wide used memory when the process cannot be
/// refreshed, and to total system memory when the budget is zero.
pub struct ProcessMemorySampler {
    system: Mutex<System>,
    pid: Option<Pid>,
    budget_bytes: u64,
}

impl ProcessMemorySampler {
    pub fn new(budget_bytes: u64) -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
            budget_bytes,
        }
    }
}

impl fmt::Debug for ProcessMemorySampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessMemorySampler")
            .field("pid", &self.pid)
            .field("budget_bytes", &self.budget_bytes)
            .finish()
    }
}

impl MemorySampler for ProcessMemorySampler {
    fn sample(&self) -> Option<MemorySample> {
        let mut sys = self.system.lock().ok()?;
        sys.refresh_memory();

        let process_bytes = match self.pid {
            Some(pid) if sys.refresh_process(pid) => sys.process(pid).map(|process| process.memory()),
            _ => None,
        };
        let used_bytes = process_bytes.unwrap_or_else(|| sys.used_memory());

        let limit_bytes = if self.budget_bytes > 0 {
            self.budget_bytes
        } else {
            sys.total_memory()
        };
        if limit_bytes == 0 {
            return None;
        }

        Some(MemorySample {
            used_bytes,
            limit_bytes,
        })
    }
}

// == Fixed Memory Sampler ==
/// Returns whatever sample was last set.
#[derive(Debug, Default)]
pub struct FixedMemorySampler {
    sample: Mutex<Option<MemorySample>>,
}

impl FixedMemorySampler {
    pub fn new(sample: Option<MemorySample>) -> Self {
        Self {
            sample: Mutex::new(sample),
        }
    }

    pub fn set(&self, sample: Option<MemorySample>) {
        if let Ok(mut guard) = self.sample.lock() {
            *guard = sample;
        }
    }
}

impl MemorySampler for FixedMemorySampler {
    fn sample(&self) -> Option<MemorySample> {
        self.sample.lock().ok().and_then(|guard| *guard)
    }
}
