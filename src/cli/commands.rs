use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::{AppContext, Result};
use crate::config::Config;
use crate::domain::{JobId, JobResult};
use crate::pool::spawn_health_monitor;
use crate::queue::spawn_reconciler;
use crate::store::ResultStore;
use crate::worker::{self, ChatSummarizer, Summarizer};

const WAIT_TICK: Duration = Duration::from_millis(500);

pub async fn fetch(ctx: &AppContext, query: &str) -> Result<()> {
    let article = ctx.pipeline.get_article(query).await;
    ctx.cleanup().await;

    match article {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("No article found for: {}", query),
    }
    Ok(())
}

/// Acquire every query, summarize through the pool and print the results
pub async fn run(ctx: &AppContext, queries: &[String], remote: bool) -> Result<()> {
    let mut submitted: Vec<(String, JobId)> = Vec::new();

    for query in queries {
        let Some(record) = ctx.pipeline.get_article(query).await else {
            println!("[{}] no article found", query);
            continue;
        };
        // A bodiless record would persist a title-only summary under the article's id
        if !record.has_content() {
            println!("[{}] no content for {}, skipped", query, record.link);
            continue;
        }
        let outcome = ctx.queue.submit(record)?;
        println!("[{}] {} ({})", query, outcome.id, outcome.status.as_str());
        submitted.push((query.clone(), outcome.id));
    }
    ctx.cleanup().await;

    if submitted.iter().all(|(_, id)| ctx.store.exists(id)) {
        for (query, id) in &submitted {
            print_result(query, id, &ctx.queue.get_result(id)?);
        }
        return Ok(());
    }

    let pool = ctx.worker_pool()?;
    pool.start().await?;
    let health = spawn_health_monitor(pool.clone());
    let reconciler = spawn_reconciler(ctx.queue.clone(), ctx.config.pool.reconcile_interval());

    let hub = if remote || ctx.config.remote.enabled {
        let hub = ctx.remote_hub();
        let (addr, accept) = hub.clone().listen(&ctx.config.remote.listen).await?;
        println!("Accepting remote workers on {}", addr);
        Some((hub, accept))
    } else {
        None
    };

    let interrupted = wait_for_jobs(ctx, &submitted).await?;

    health.abort();
    reconciler.abort();
    if let Some((hub, accept)) = hub {
        accept.abort();
        info!(connected = hub.status().len(), "Remote hub closed");
    }

    let status = pool.status().await;
    let restarts: u32 = status.workers.iter().map(|w| w.restarts).sum();
    info!(active = status.active, total = status.total, restarts, "Stopping workers");
    pool.shutdown(pool.config().shutdown_grace()).await;

    if interrupted {
        println!("Interrupted, unfinished jobs were abandoned");
    }

    for (query, id) in &submitted {
        print_result(query, id, &ctx.queue.get_result(id)?);
    }
    Ok(())
}

/// Wait until every job is done or failed. Returns `true` on interruption.
async fn wait_for_jobs(ctx: &AppContext, jobs: &[(String, JobId)]) -> Result<bool> {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(WAIT_TICK);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                warn!("Shutdown signal received");
                return Ok(true);
            }
            _ = ticker.tick() => {
                let mut remaining = 0;
                for (_, id) in jobs {
                    if !ctx.queue.get_result(id)?.is_terminal() {
                        remaining += 1;
                    }
                }
                if remaining == 0 {
                    return Ok(false);
                }
            }
        }
    }
}

fn print_result(query: &str, id: &JobId, result: &JobResult) {
    match result {
        JobResult::Done(artifact) => {
            println!("\n[{}] {}", query, artifact.title);
            println!("{}", artifact.link);
            if let Some(ref image) = artifact.image_url {
                println!("{}", image);
            }
            println!("\n{}", artifact.summary);
        }
        JobResult::Failed { reason } => println!("\n[{}] {} failed: {}", query, id, reason),
        JobResult::Pending => println!("\n[{}] {} still pending", query, id),
        JobResult::Unknown => println!("\n[{}] {} unknown", query, id),
    }
}

pub fn show_result(ctx: &AppContext, id: &str) -> Result<()> {
    let id = JobId::new(id)?;
    match ctx.queue.get_result(&id)? {
        JobResult::Done(artifact) => println!("{}", serde_json::to_string_pretty(&artifact)?),
        JobResult::Failed { reason } => println!("failed: {}", reason),
        JobResult::Pending | JobResult::Unknown => println!("pending or unknown: {}", id),
    }
    Ok(())
}

pub fn list_results(ctx: &AppContext) -> Result<()> {
    let ids = ctx.store.list_ids()?;
    if ids.is_empty() {
        println!("No summaries yet");
        return Ok(());
    }
    for id in ids {
        match ctx.store.read(&id)? {
            Some(artifact) => println!("{}  {}", id, artifact.title),
            None => println!("{}", id),
        }
    }
    Ok(())
}

/// Load the summarizer and serve one dispatcher until it disconnects
pub async fn run_worker(config: &Config, connect: Option<&str>) -> Result<()> {
    let summarizer: Arc<dyn Summarizer> =
        Arc::new(ChatSummarizer::load(config.summarizer.clone())?);

    match connect {
        Some(addr) => worker::run_remote(addr, summarizer).await,
        None => worker::run_stdio(summarizer).await,
    }
}

/// Resolves on SIGTERM or SIGINT (Ctrl-C elsewhere)
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv() => {},
                }
            }
            _ => {
                warn!("Failed to install signal handlers, falling back to Ctrl-C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
