//! Server side of one worker link.
//!
//! A driver owns the protocol conversation with a single worker, local or
//! remote: wait for `Ready`, then loop pulling a job, confirming the worker
//! is idle, sending the task and applying its outcome to the queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::Result;
use crate::domain::SummaryArtifact;
use crate::pool::LinkState;
use crate::protocol::{FrameReader, FrameWriter, Message, ProtocolError};
use crate::queue::{Job, JobQueue};

type Inbox = mpsc::Receiver<std::result::Result<Message, ProtocolError>>;

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Read frames on a separate task so that waiting on the queue and
/// watching the link can be raced without losing a half-read frame.
fn spawn_reader<R>(reader: R) -> (Inbox, AbortOnDrop)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(async move {
        let mut reader = FrameReader::new(reader);
        loop {
            let frame = reader.recv().await;
            let failed = frame.is_err();
            if tx.send(frame).await.is_err() || failed {
                break;
            }
        }
    });
    (rx, AbortOnDrop(handle))
}

async fn next_message(inbox: &mut Inbox) -> std::result::Result<Message, ProtocolError> {
    match inbox.recv().await {
        Some(frame) => frame,
        None => Err(ProtocolError::Closed),
    }
}

enum Outcome {
    Completed,
    Failed,
    Rejected,
}

/// Drive a worker link until it closes.
///
/// Returns `Ok(())` when the worker closes the link cleanly and an error
/// otherwise. Either way any job in hand has been returned to the queue.
pub async fn drive_link<R, W>(
    label: String,
    reader: R,
    writer: W,
    queue: Arc<JobQueue>,
    link: Arc<LinkState>,
    poll: Duration,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send,
{
    let (mut inbox, _reader_task) = spawn_reader(reader);
    let mut writer = FrameWriter::new(writer);

    let result = run(&label, &mut inbox, &mut writer, &queue, &link, poll).await;

    if let Some(job) = link.take_job() {
        if let Err(e) = queue.retry(&job, "worker link lost") {
            error!(worker = %label, id = %job.id, error = %e, "Failed to requeue job");
        }
    }
    link.mark_dead();

    match result {
        Err(crate::app::SummaristError::Protocol(ProtocolError::Closed)) => {
            info!(worker = %label, "Worker link closed");
            Ok(())
        }
        Err(e) => {
            warn!(worker = %label, error = %e, "Worker link failed");
            Err(e)
        }
        Ok(()) => Ok(()),
    }
}

async fn run<W>(
    label: &str,
    inbox: &mut Inbox,
    writer: &mut FrameWriter<W>,
    queue: &JobQueue,
    link: &LinkState,
    poll: Duration,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    match next_message(inbox).await? {
        Message::Ready { pid, name } => {
            info!(worker = label, pid, name = %name, "Worker ready");
            link.mark_ready(pid);
        }
        other => {
            return Err(ProtocolError::Unexpected(format!(
                "expected ready, got {}",
                other.kind()
            ))
            .into())
        }
    }

    loop {
        let job = tokio::select! {
            job = queue.next_job() => job?,
            message = inbox.recv() => {
                match message {
                    Some(Ok(other)) => {
                        debug!(worker = label, kind = other.kind(), "Ignoring message while idle");
                        continue;
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(ProtocolError::Closed.into()),
                }
            }
        };
        link.begin(job.clone());

        if !is_idle(inbox, writer).await? {
            debug!(worker = label, id = %job.id, "Worker busy, returning job");
            queue.release(&job)?;
            link.finish(false);
            tokio::time::sleep(poll).await;
            continue;
        }

        info!(worker = label, id = %job.id, attempt = job.attempt, "Dispatching");
        writer
            .send(&Message::Task {
                id: job.id.clone(),
                article: job.record.clone(),
            })
            .await?;

        match await_outcome(label, inbox, queue, &job).await? {
            Outcome::Completed => link.finish(true),
            Outcome::Failed => link.finish(false),
            Outcome::Rejected => {
                link.finish(false);
                tokio::time::sleep(poll).await;
            }
        }
    }
}

/// Ask the worker for its status and wait for the answer
async fn is_idle<W>(inbox: &mut Inbox, writer: &mut FrameWriter<W>) -> Result<bool>
where
    W: AsyncWrite + Unpin + Send,
{
    writer.send(&Message::StatusQuery).await?;
    loop {
        match next_message(inbox).await? {
            Message::Status { busy } => return Ok(!busy),
            other => debug!(kind = other.kind(), "Ignoring message while polling"),
        }
    }
}

async fn await_outcome(
    label: &str,
    inbox: &mut Inbox,
    queue: &JobQueue,
    job: &Job,
) -> Result<Outcome> {
    loop {
        match next_message(inbox).await? {
            Message::TaskStarted { id } if id == job.id => {
                debug!(worker = label, %id, "Task started");
            }
            Message::TaskCompleted { id, summary } if id == job.id => {
                let artifact = SummaryArtifact {
                    id: job.id.clone(),
                    title: job.record.title.clone(),
                    link: job.record.link.clone(),
                    image_url: job.record.image_url.clone(),
                    summary,
                    worker: label.to_string(),
                    attempts: job.attempt,
                    completed_at: Utc::now(),
                };
                return match queue.store().persist(&artifact) {
                    Ok(()) => {
                        info!(worker = label, %id, "Summary persisted");
                        Ok(Outcome::Completed)
                    }
                    Err(e) => {
                        error!(worker = label, %id, error = %e, "Failed to persist summary");
                        queue.retry(job, &format!("persist failed: {}", e))?;
                        Ok(Outcome::Failed)
                    }
                };
            }
            Message::TaskFailed { id, error } if id == job.id => {
                warn!(worker = label, %id, error = %error, "Task failed on worker");
                queue.retry(job, &error)?;
                return Ok(Outcome::Failed);
            }
            Message::TaskRejected { id } if id == job.id => {
                warn!(worker = label, %id, "Task rejected, worker busy");
                queue.release(job)?;
                return Ok(Outcome::Rejected);
            }
            Message::Status { .. } => {}
            other => {
                warn!(worker = label, kind = other.kind(), "Unexpected message during task");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tokio::io::{duplex, DuplexStream, ReadHalf, WriteHalf};

    use super::*;
    use crate::app::SummaristError;
    use crate::domain::{ArticleRecord, JobId, JobResult, JobState, SubmitStatus};
    use crate::pool::SlotState;
    use crate::store::FsResultStore;
    use crate::worker::{serve, Summarizer};

    #[derive(Default)]
    struct SpySummarizer {
        calls: StdMutex<HashMap<String, usize>>,
    }

    #[async_trait]
    impl Summarizer for SpySummarizer {
        async fn summarize(&self, text: &str) -> Result<String> {
            *self
                .calls
                .lock()
                .unwrap()
                .entry(text.to_string())
                .or_default() += 1;
            Ok(format!("short: {}", text.lines().next().unwrap_or_default()))
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        async fn summarize(&self, _text: &str) -> Result<String> {
            Err(SummaristError::Summarizer("out of memory".into()))
        }
    }

    fn setup(max_attempts: u32) -> (tempfile::TempDir, Arc<JobQueue>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FsResultStore::new(dir.path()).unwrap());
        (dir, Arc::new(JobQueue::with_max_attempts(store, max_attempts)))
    }

    fn record(title: &str) -> ArticleRecord {
        ArticleRecord {
            title: title.into(),
            link: format!("https://kr.investing.com/news/{}", title),
            content: Some("sample text".into()),
            image_url: None,
        }
    }

    /// Connect a driver to an in-process worker
    fn link_to_worker(
        queue: Arc<JobQueue>,
        summarizer: Arc<dyn Summarizer>,
    ) -> (Arc<LinkState>, JoinHandle<Result<()>>) {
        let (server_side, worker_side) = duplex(64 * 1024);
        let (worker_read, worker_write) = tokio::io::split(worker_side);
        let (server_read, server_write) = tokio::io::split(server_side);

        tokio::spawn(async move {
            let _ = serve(worker_read, worker_write, summarizer, "spy").await;
        });

        let link = Arc::new(LinkState::new());
        let driver = tokio::spawn(drive_link(
            "spy".into(),
            server_read,
            server_write,
            queue,
            link.clone(),
            Duration::from_millis(20),
        ));
        (link, driver)
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_dispatch_persists_artifact() {
        let (_dir, queue) = setup(3);
        let spy = Arc::new(SpySummarizer::default());
        let (link, _driver) = link_to_worker(queue.clone(), spy.clone());

        let id = JobId::new("7").unwrap();
        let outcome = queue.submit_with_id(id.clone(), record("A")).unwrap();
        assert_eq!(outcome.status, SubmitStatus::Started);

        wait_for(|| queue.store().exists(&id)).await;
        match queue.get_result(&id).unwrap() {
            JobResult::Done(artifact) => {
                assert_eq!(artifact.summary, "short: A");
                assert_eq!(artifact.worker, "spy");
                assert_eq!(artifact.attempts, 1);
            }
            other => panic!("expected done, got {:?}", other),
        }

        wait_for(|| link.snapshot().completed == 1).await;
        assert_eq!(link.state(), SlotState::Ready);

        // Resubmission after completion never reaches the summarizer
        let again = queue.submit_with_id(id.clone(), record("A")).unwrap();
        assert_eq!(again.status, SubmitStatus::AlreadyExist);
        assert_eq!(spy.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failures_exhaust_attempts() {
        let (_dir, queue) = setup(2);
        let (_link, _driver) = link_to_worker(queue.clone(), Arc::new(FailingSummarizer));

        let id = JobId::new("doomed").unwrap();
        queue.submit_with_id(id.clone(), record("B")).unwrap();

        wait_for(|| queue.state(&id).unwrap() == Some(JobState::Failed)).await;
        match queue.get_result(&id).unwrap() {
            JobResult::Failed { reason } => assert!(reason.contains("out of memory")),
            other => panic!("expected failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bodiless_record_never_persisted() {
        let (_dir, queue) = setup(2);
        let spy = Arc::new(SpySummarizer::default());
        let (_link, _driver) = link_to_worker(queue.clone(), spy.clone());

        let mut bodiless = record("Headline");
        bodiless.content = None;
        let first = queue.submit(bodiless).unwrap();
        wait_for(|| queue.state(&first.id).unwrap() == Some(JobState::Failed)).await;
        assert!(!queue.store().exists(&first.id));
        assert!(spy.calls.lock().unwrap().is_empty());

        // Once the page yields a body the same article is summarized
        let second = queue.submit(record("Headline")).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.status, SubmitStatus::Started);
        wait_for(|| queue.store().exists(&second.id)).await;
        assert_eq!(spy.calls.lock().unwrap().len(), 1);
    }

    struct FakeWorker {
        reader: FrameReader<ReadHalf<DuplexStream>>,
        writer: FrameWriter<WriteHalf<DuplexStream>>,
    }

    fn link_to_fake(queue: Arc<JobQueue>) -> (FakeWorker, Arc<LinkState>, JoinHandle<Result<()>>) {
        let (server_side, worker_side) = duplex(64 * 1024);
        let (worker_read, worker_write) = tokio::io::split(worker_side);
        let (server_read, server_write) = tokio::io::split(server_side);

        let link = Arc::new(LinkState::new());
        let driver = tokio::spawn(drive_link(
            "fake".into(),
            server_read,
            server_write,
            queue,
            link.clone(),
            Duration::from_millis(20),
        ));
        (
            FakeWorker {
                reader: FrameReader::new(worker_read),
                writer: FrameWriter::new(worker_write),
            },
            link,
            driver,
        )
    }

    #[tokio::test]
    async fn test_busy_worker_gets_no_task() {
        let (_dir, queue) = setup(3);
        let (mut fake, link, _driver) = link_to_fake(queue.clone());
        fake.writer
            .send(&Message::Ready {
                pid: 1,
                name: "fake".into(),
            })
            .await
            .unwrap();

        let id = JobId::new("7").unwrap();
        queue.submit_with_id(id.clone(), record("A")).unwrap();

        // Report busy a few times; the task must not arrive meanwhile
        for _ in 0..3 {
            assert_eq!(fake.reader.recv().await.unwrap(), Message::StatusQuery);
            fake.writer.send(&Message::Status { busy: true }).await.unwrap();
        }
        assert_eq!(fake.reader.recv().await.unwrap(), Message::StatusQuery);
        fake.writer.send(&Message::Status { busy: false }).await.unwrap();

        match fake.reader.recv().await.unwrap() {
            Message::Task { id: sent, article } => {
                assert_eq!(sent, id);
                assert_eq!(article.title, "A");
            }
            other => panic!("expected task, got {:?}", other),
        }
        assert_eq!(link.state(), SlotState::Busy);

        // Busy polls never consumed attempts
        fake.writer
            .send(&Message::TaskCompleted {
                id: id.clone(),
                summary: "done".into(),
            })
            .await
            .unwrap();
        wait_for(|| queue.store().exists(&id)).await;
        let artifact = queue.store().read(&id).unwrap().unwrap();
        assert_eq!(artifact.attempts, 1);
    }

    #[tokio::test]
    async fn test_link_loss_requeues_held_job() {
        let (_dir, queue) = setup(3);
        let (mut fake, link, driver) = link_to_fake(queue.clone());
        fake.writer
            .send(&Message::Ready {
                pid: 1,
                name: "fake".into(),
            })
            .await
            .unwrap();

        let id = JobId::new("orphan").unwrap();
        queue.submit_with_id(id.clone(), record("A")).unwrap();

        assert_eq!(fake.reader.recv().await.unwrap(), Message::StatusQuery);
        fake.writer.send(&Message::Status { busy: false }).await.unwrap();
        assert!(matches!(fake.reader.recv().await.unwrap(), Message::Task { .. }));
        assert_eq!(queue.state(&id).unwrap(), Some(JobState::InFlight));

        drop(fake);
        assert!(driver.await.unwrap().is_ok());

        assert_eq!(link.state(), SlotState::Dead);
        assert_eq!(queue.state(&id).unwrap(), Some(JobState::Pending));
        assert!(queue.is_in_flight(&id).unwrap());
    }

    #[tokio::test]
    async fn test_rejection_does_not_count_attempt() {
        let (_dir, queue) = setup(1);
        let (mut fake, _link, _driver) = link_to_fake(queue.clone());
        fake.writer
            .send(&Message::Ready {
                pid: 1,
                name: "fake".into(),
            })
            .await
            .unwrap();

        let id = JobId::new("bounce").unwrap();
        queue.submit_with_id(id.clone(), record("A")).unwrap();

        for round in 0..2 {
            assert_eq!(fake.reader.recv().await.unwrap(), Message::StatusQuery);
            fake.writer.send(&Message::Status { busy: false }).await.unwrap();
            let Message::Task { id: sent, .. } = fake.reader.recv().await.unwrap() else {
                panic!("expected task");
            };
            if round == 0 {
                fake.writer.send(&Message::TaskRejected { id: sent }).await.unwrap();
            } else {
                fake.writer
                    .send(&Message::TaskCompleted {
                        id: sent,
                        summary: "ok".into(),
                    })
                    .await
                    .unwrap();
            }
        }

        wait_for(|| queue.store().exists(&id)).await;
    }

    #[tokio::test]
    async fn test_garbage_before_ready_fails_link() {
        let (_dir, queue) = setup(3);
        let (mut fake, link, driver) = link_to_fake(queue);
        fake.writer.send(&Message::StatusQuery).await.unwrap();

        let result = driver.await.unwrap();
        assert!(matches!(
            result,
            Err(SummaristError::Protocol(ProtocolError::Unexpected(_)))
        ));
        assert_eq!(link.state(), SlotState::Dead);
    }
}
