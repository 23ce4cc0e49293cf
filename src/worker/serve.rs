use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::Result;
use crate::domain::{ArticleRecord, JobId};
use crate::protocol::{FrameReader, FrameWriter, Message, ProtocolError};
use crate::worker::Summarizer;

type SharedWriter<W> = Arc<Mutex<FrameWriter<W>>>;

/// Run the worker side of a link until the server says goodbye.
///
/// Announces `Ready`, then answers status queries and runs at most one task
/// at a time. The busy flag is set when a task is accepted and cleared only
/// after its summary (or error) has been produced, so a status reply never
/// claims idle while a summarization is running.
pub async fn serve<R, W>(
    reader: R,
    writer: W,
    summarizer: Arc<dyn Summarizer>,
    name: &str,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = FrameReader::new(reader);
    let writer: SharedWriter<W> = Arc::new(Mutex::new(FrameWriter::new(writer)));
    let busy = Arc::new(AtomicBool::new(false));
    let mut running: Option<JoinHandle<()>> = None;

    writer
        .lock()
        .await
        .send(&Message::Ready {
            pid: std::process::id(),
            name: name.to_string(),
        })
        .await?;
    info!(name, "Worker ready");

    loop {
        let message = match reader.recv().await {
            Ok(message) => message,
            Err(ProtocolError::Closed) => {
                info!(name, "Server closed the link");
                if let Some(task) = running.take() {
                    task.abort();
                }
                return Ok(());
            }
            Err(e) => {
                if let Some(task) = running.take() {
                    task.abort();
                }
                return Err(e.into());
            }
        };

        match message {
            Message::StatusQuery => {
                let reply = Message::Status {
                    busy: busy.load(Ordering::SeqCst),
                };
                writer.lock().await.send(&reply).await?;
            }
            Message::Task { id, article } => {
                if busy.swap(true, Ordering::SeqCst) {
                    warn!(%id, "Task arrived while busy, rejecting");
                    writer
                        .lock()
                        .await
                        .send(&Message::TaskRejected { id })
                        .await?;
                    continue;
                }

                writer
                    .lock()
                    .await
                    .send(&Message::TaskStarted { id: id.clone() })
                    .await?;
                running = Some(tokio::spawn(run_task(
                    id,
                    article,
                    summarizer.clone(),
                    writer.clone(),
                    busy.clone(),
                )));
            }
            Message::Shutdown => {
                info!(name, "Shutdown requested");
                if let Some(task) = running.take() {
                    let _ = task.await;
                }
                return Ok(());
            }
            other => {
                warn!(kind = other.kind(), "Ignoring unexpected message");
            }
        }
    }
}

async fn run_task<W>(
    id: JobId,
    article: ArticleRecord,
    summarizer: Arc<dyn Summarizer>,
    writer: SharedWriter<W>,
    busy: Arc<AtomicBool>,
) where
    W: AsyncWrite + Unpin + Send,
{
    let reply = match article.summary_input() {
        Some(input) => summarize(id, &input, summarizer.as_ref(), article.display_title()).await,
        None => {
            warn!(%id, title = article.display_title(), "Article has no body, refusing to summarize");
            Message::TaskFailed {
                id,
                error: "article has no content".to_string(),
            }
        }
    };

    // Idle again before the server can act on the reply
    busy.store(false, Ordering::SeqCst);

    if let Err(e) = writer.lock().await.send(&reply).await {
        warn!(error = %e, "Failed to report task outcome");
    }
}

async fn summarize(id: JobId, input: &str, summarizer: &dyn Summarizer, title: &str) -> Message {
    info!(%id, title, "Summarizing");

    match summarizer.summarize(input).await {
        Ok(summary) => {
            debug!(%id, "Summary ready");
            Message::TaskCompleted { id, summary }
        }
        Err(e) => {
            error!(%id, error = %e, "Summarization failed");
            Message::TaskFailed {
                id,
                error: e.to_string(),
            }
        }
    }
}
