//! Runs the real `summarist worker` binary under the pool, talking to a
//! local chat-completion endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use summarist::domain::{ArticleRecord, JobResult};
use summarist::pool::{CommandLauncher, PoolConfig, WorkerPool};
use summarist::queue::JobQueue;
use summarist::store::{FsResultStore, ResultStore};

const COMPLETION: &str =
    r#"{"choices":[{"message":{"role":"assistant","content":"  Chip exports rose 12%.  "}}]}"#;

/// Read one HTTP request, headers plus `content-length` bytes of body
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Answer every request with the canned completion, keeping the bodies seen
async fn serve_completions(
    requests: Arc<AtomicUsize>,
    bodies: Arc<std::sync::Mutex<Vec<String>>>,
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let requests = requests.clone();
            let bodies = bodies.clone();
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                requests.fetch_add(1, Ordering::SeqCst);
                bodies.lock().unwrap().push(request);
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    COMPLETION.len(),
                    COMPLETION
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}/v1", addr)
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(30), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("timed out");
}

#[cfg(unix)]
#[tokio::test]
async fn spawned_worker_summarizes_over_stdio() {
    let requests = Arc::new(AtomicUsize::new(0));
    let bodies = Arc::new(std::sync::Mutex::new(Vec::new()));
    let base_url = serve_completions(requests.clone(), bodies.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let results_dir = dir.path().join("results");
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            "[store]\nresults_dir = {:?}\n\n[summarizer]\nbase_url = {:?}\nmodel = \"test-model\"\napi_key_env = \"SUMMARIST_TEST_UNSET_KEY\"\n",
            results_dir.display().to_string(),
            base_url
        ),
    )
    .unwrap();

    let store = Arc::new(FsResultStore::new(&results_dir).unwrap());
    let queue = Arc::new(JobQueue::new(store.clone()));
    let launcher = CommandLauncher::new(
        env!("CARGO_BIN_EXE_summarist"),
        vec![
            "--config".to_string(),
            config_path.display().to_string(),
            "worker".to_string(),
        ],
    );
    let config = PoolConfig {
        workers: 1,
        status_poll_ms: 50,
        ..PoolConfig::default()
    };
    let pool = WorkerPool::new(config, Arc::new(launcher), queue.clone());
    pool.start().await.unwrap();

    let record = ArticleRecord {
        title: "Chip exports".into(),
        link: "https://kr.investing.com/news/stock-market-news/chip-exports-1".into(),
        content: Some("Semiconductor exports rose 12% in September.".into()),
        image_url: None,
    };
    let outcome = queue.submit(record).unwrap();
    wait_until(|| store.exists(&outcome.id)).await;

    match queue.get_result(&outcome.id).unwrap() {
        JobResult::Done(artifact) => {
            assert_eq!(artifact.summary, "Chip exports rose 12%.");
            assert_eq!(artifact.title, "Chip exports");
            assert_eq!(artifact.worker, "local-0");
        }
        other => panic!("expected done, got {:?}", other),
    }

    assert_eq!(requests.load(Ordering::SeqCst), 1);
    let seen = bodies.lock().unwrap().join("\n");
    assert!(seen.starts_with("POST /v1/chat/completions"));
    assert!(seen.contains("test-model"));
    assert!(seen.contains("Semiconductor exports rose 12% in September."));
    assert!(!seen.to_ascii_lowercase().contains("authorization:"));

    let status = pool.status().await;
    assert_eq!(status.total, 1);
    pool.shutdown(Duration::from_secs(1)).await;
}
