//! Worker side of the dispatch protocol.
//!
//! A worker loads its [`Summarizer`] once, announces itself, and then
//! serves tasks one at a time over either its stdio (local workers spawned
//! by the pool) or a TCP connection (remote workers).

mod serve;
pub mod summarizer;

pub use serve::serve;
pub use summarizer::{ChatSummarizer, Summarizer, SummarizerConfig};

use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::info;

use crate::app::Result;

/// Index assigned by the pool to a spawned worker process
pub const WORKER_INDEX_ENV: &str = "SUMMARIST_WORKER_INDEX";

/// Label used in `Ready` and in logs
pub fn worker_name() -> String {
    match std::env::var(WORKER_INDEX_ENV) {
        Ok(index) => format!("local-{}", index),
        Err(_) => format!("worker-{}", std::process::id()),
    }
}

/// Serve a pool over this process's stdin and stdout
pub async fn run_stdio(summarizer: Arc<dyn Summarizer>) -> Result<()> {
    let name = worker_name();
    serve(tokio::io::stdin(), tokio::io::stdout(), summarizer, &name).await
}

/// Connect out to a remote dispatcher and serve it
pub async fn run_remote(addr: &str, summarizer: Arc<dyn Summarizer>) -> Result<()> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    info!(addr, "Connected to dispatcher");

    let name = match stream.local_addr() {
        Ok(local) => format!("remote-{}", local),
        Err(_) => worker_name(),
    };
    let (reader, writer) = stream.into_split();
    serve(reader, writer, summarizer, &name).await
}
