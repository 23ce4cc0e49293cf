use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::queue::DEFAULT_MAX_ATTEMPTS;

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of local worker processes
    pub workers: usize,

    /// Dispatch attempts before a job is marked failed
    pub max_attempts: u32,

    pub health_interval_secs: u64,
    pub reconcile_interval_secs: u64,

    /// How long a worker gets to exit on its own before it is killed
    pub shutdown_grace_secs: u64,

    /// Interval between status polls while a worker reports busy
    pub status_poll_ms: u64,

    /// Worker executable; defaults to this binary
    pub worker_program: Option<PathBuf>,

    /// Arguments for `worker_program`; defaults to `["worker"]`
    pub worker_args: Vec<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            health_interval_secs: 5,
            reconcile_interval_secs: 1,
            shutdown_grace_secs: 1,
            status_poll_ms: 2000,
            worker_program: None,
            worker_args: Vec::new(),
        }
    }
}

impl PoolConfig {
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.max(1))
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn status_poll(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms.max(10))
    }
}
