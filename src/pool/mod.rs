//! Worker supervisor.
//!
//! The pool keeps a fixed number of local worker processes alive. Each slot
//! pairs a child process with a link driver ([`drive_link`]) that talks to
//! it over its stdin and stdout. A health check replaces any slot whose
//! process exited (or whose driver gave up) at the same index, so the pool
//! size never changes.

mod config;
mod driver;
mod launcher;
mod state;

pub use config::PoolConfig;
pub use driver::drive_link;
pub use launcher::{CommandLauncher, WorkerLauncher};
pub use state::{LinkSnapshot, LinkState, SlotState};

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::{Result, SummaristError};
use crate::queue::JobQueue;

struct Slot {
    index: usize,
    child: Child,
    pid: Option<u32>,
    link: Arc<LinkState>,
    driver: Option<JoinHandle<()>>,
    restarts: u32,
}

impl Slot {
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

/// One row of [`PoolStatus`]
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub index: usize,
    pub pid: Option<u32>,
    pub alive: bool,
    pub busy: bool,
    pub state: SlotState,
    pub restarts: u32,
    pub completed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub total: usize,
    pub active: usize,
    pub workers: Vec<WorkerStatus>,
}

pub struct WorkerPool {
    config: PoolConfig,
    launcher: Arc<dyn WorkerLauncher>,
    queue: Arc<JobQueue>,
    slots: Mutex<Vec<Slot>>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig, launcher: Arc<dyn WorkerLauncher>, queue: Arc<JobQueue>) -> Self {
        Self {
            config,
            launcher,
            queue,
            slots: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Launch one worker for `index` and attach a driver to it
    fn launch_slot(&self, index: usize) -> Result<Slot> {
        let mut child = self.launcher.launch(index)?;
        let pid = child.id();

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            let _ = child.start_kill();
            return Err(SummaristError::Worker(format!(
                "Worker {} was launched without piped stdio",
                index
            )));
        };

        let link = Arc::new(LinkState::new());
        let label = format!("local-{}", index);
        let driver = tokio::spawn({
            let queue = self.queue.clone();
            let link = link.clone();
            let poll = self.config.status_poll();
            async move {
                let _ = drive_link(label, stdout, stdin, queue, link, poll).await;
            }
        });

        info!(index, pid = ?pid, "Worker started");
        Ok(Slot {
            index,
            child,
            pid,
            link,
            driver: Some(driver),
            restarts: 0,
        })
    }

    /// Stop the driver of a slot and return its job to the queue.
    ///
    /// `crash` is the failure reason when the worker died; `None` for a
    /// deliberate stop, which does not spend an attempt.
    async fn detach(&self, slot: &mut Slot, crash: Option<&str>) {
        if let Some(driver) = slot.driver.take() {
            driver.abort();
            let _ = driver.await;
        }
        match slot.link.hand_back(&self.queue, crash) {
            Ok(Some(id)) => info!(index = slot.index, %id, "Returned job to queue"),
            Ok(None) => {}
            Err(e) => error!(index = slot.index, error = %e, "Failed to requeue job"),
        }
        slot.link.mark_dead();
    }

    /// Stop a slot's process, politely first
    async fn terminate(&self, slot: &mut Slot, grace: Duration) {
        // Dropping the driver closes the worker's stdin
        self.detach(slot, None).await;

        match tokio::time::timeout(grace, slot.child.wait()).await {
            Ok(Ok(status)) => info!(index = slot.index, %status, "Worker exited"),
            Ok(Err(e)) => warn!(index = slot.index, error = %e, "Failed to wait for worker"),
            Err(_) => {
                warn!(index = slot.index, pid = ?slot.pid, "Worker ignored shutdown, killing");
                if let Err(e) = slot.child.kill().await {
                    warn!(index = slot.index, error = %e, "Failed to kill worker");
                }
            }
        }
    }

    /// Spawn `config.workers` workers, replacing any that are running
    pub async fn start(&self) -> Result<()> {
        let mut slots = self.slots.lock().await;
        for slot in slots.iter_mut() {
            self.terminate(slot, self.config.shutdown_grace()).await;
        }
        slots.clear();

        for index in 0..self.config.workers {
            slots.push(self.launch_slot(index)?);
        }
        info!(workers = slots.len(), "Worker pool started");
        Ok(())
    }

    /// Replace every dead worker at its own index. Returns how many are alive.
    pub async fn health_check(&self) -> usize {
        let mut slots = self.slots.lock().await;

        for slot in slots.iter_mut() {
            let exited = slot.child.try_wait();
            let driver_gone = slot.driver.as_ref().map_or(true, |d| d.is_finished());

            match exited {
                Ok(None) if !driver_gone => continue,
                Ok(None) => {
                    warn!(index = slot.index, pid = ?slot.pid, "Worker link dropped, restarting");
                    let _ = slot.child.start_kill();
                    let _ = slot.child.wait().await;
                }
                Ok(Some(status)) => {
                    warn!(index = slot.index, pid = ?slot.pid, %status, "Worker died, restarting");
                }
                Err(e) => {
                    warn!(index = slot.index, error = %e, "Cannot poll worker, restarting");
                    let _ = slot.child.start_kill();
                }
            }

            self.detach(slot, Some("worker process exited")).await;

            match self.launch_slot(slot.index) {
                Ok(mut fresh) => {
                    fresh.restarts = slot.restarts + 1;
                    *slot = fresh;
                }
                Err(e) => {
                    error!(index = slot.index, error = %e, "Failed to restart worker");
                }
            }
        }

        let mut alive = 0;
        for slot in slots.iter_mut() {
            if slot.is_alive() {
                alive += 1;
            }
        }
        alive
    }

    /// Stop every worker and start a fresh set
    pub async fn restart_all(&self) -> Result<()> {
        info!("Restarting all workers");
        self.start().await
    }

    pub async fn status(&self) -> PoolStatus {
        let mut slots = self.slots.lock().await;

        let workers: Vec<WorkerStatus> = slots
            .iter_mut()
            .map(|slot| {
                let alive = slot.is_alive();
                let snapshot = slot.link.snapshot();
                WorkerStatus {
                    index: slot.index,
                    pid: slot.pid,
                    alive,
                    busy: snapshot.state == SlotState::Busy,
                    state: snapshot.state,
                    restarts: slot.restarts,
                    completed: snapshot.completed,
                }
            })
            .collect();

        PoolStatus {
            total: self.config.workers,
            active: workers.iter().filter(|w| w.alive).count(),
            workers,
        }
    }

    /// Stop all workers, killing any still running after `grace`
    pub async fn shutdown(&self, grace: Duration) {
        let mut slots = self.slots.lock().await;
        for slot in slots.iter_mut() {
            self.terminate(slot, grace).await;
        }
        slots.clear();
        info!("Worker pool stopped");
    }
}

/// Run [`WorkerPool::health_check`] on the configured interval
pub fn spawn_health_monitor(pool: Arc<WorkerPool>) -> JoinHandle<()> {
    let interval = pool.config().health_interval();
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            let alive = pool.health_check().await;
            if alive < pool.config().workers {
                warn!(alive, total = pool.config().workers, "Worker pool below size");
            }
        }
    })
}
