//! Detached workers over TCP.
//!
//! The hub listens for workers started elsewhere with
//! `summarist worker --connect <addr>`. Each accepted connection gets the
//! same link driver as a local slot and pulls from the same queue. A
//! connection that drops takes nothing with it: its job is requeued and
//! the worker is forgotten.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::Result;
use crate::pool::{drive_link, LinkSnapshot, LinkState};
use crate::queue::JobQueue;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Accept remote workers during `run` without `--remote`
    pub enabled: bool,

    pub listen: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "127.0.0.1:6666".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteWorkerStatus {
    pub addr: SocketAddr,
    #[serde(flatten)]
    pub link: LinkSnapshot,
}

pub struct RemoteHub {
    queue: Arc<JobQueue>,
    poll: Duration,
    workers: Mutex<HashMap<SocketAddr, Arc<LinkState>>>,
}

impl RemoteHub {
    pub fn new(queue: Arc<JobQueue>, poll: Duration) -> Self {
        Self {
            queue,
            poll,
            workers: Mutex::new(HashMap::new()),
        }
    }

    fn register(&self, addr: SocketAddr) -> Arc<LinkState> {
        let link = Arc::new(LinkState::new());
        if let Ok(mut workers) = self.workers.lock() {
            workers.insert(addr, link.clone());
        }
        link
    }

    fn forget(&self, addr: &SocketAddr) {
        if let Ok(mut workers) = self.workers.lock() {
            workers.remove(addr);
        }
    }

    /// Bind `addr` and accept workers on a background task
    pub async fn listen(self: Arc<Self>, addr: &str) -> Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        info!(addr = %local, "Accepting remote workers");
        Ok((local, tokio::spawn(self.accept_loop(listener))))
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "Failed to accept remote worker");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                warn!(%addr, error = %e, "Failed to set TCP_NODELAY");
            }
            info!(%addr, "Remote worker connected");

            let link = self.register(addr);
            let hub = self.clone();
            tokio::spawn(async move {
                let (reader, writer) = stream.into_split();
                let label = format!("remote-{}", addr);
                let _ = drive_link(label, reader, writer, hub.queue.clone(), link, hub.poll).await;
                hub.forget(&addr);
                info!(%addr, "Remote worker disconnected");
            });
        }
    }

    /// Connected remote workers
    pub fn status(&self) -> Vec<RemoteWorkerStatus> {
        let Ok(workers) = self.workers.lock() else {
            return Vec::new();
        };
        let mut status: Vec<RemoteWorkerStatus> = workers
            .iter()
            .map(|(addr, link)| RemoteWorkerStatus {
                addr: *addr,
                link: link.snapshot(),
            })
            .collect();
        status.sort_by_key(|w| w.addr);
        status
    }
}
