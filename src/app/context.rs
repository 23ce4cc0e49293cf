use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::Result;
use crate::config::Config;
use crate::fetcher::ArticleSource;
use crate::fetcher::HttpFetcher;
use crate::pipeline::AcquisitionPipeline;
use crate::pool::{CommandLauncher, WorkerLauncher, WorkerPool};
use crate::queue::JobQueue;
use crate::remote::RemoteHub;
use crate::renderer::ChromeRenderer;
use crate::store::FsResultStore;

pub struct AppContext {
    pub config: Config,
    /// File the config came from, forwarded to spawned workers
    pub config_path: Option<PathBuf>,
    pub store: Arc<FsResultStore>,
    pub queue: Arc<JobQueue>,
    pub pipeline: AcquisitionPipeline,
    pub renderer: Arc<ChromeRenderer>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let results_dir = config.store.results_dir()?;
        Self::with_results_dir(config, results_dir)
    }

    pub fn with_results_dir(config: Config, results_dir: PathBuf) -> Result<Self> {
        let store = Arc::new(FsResultStore::new(&results_dir)?);
        let queue = Arc::new(JobQueue::with_max_attempts(
            store.clone(),
            config.pool.max_attempts,
        ));

        let http: Arc<dyn ArticleSource> = Arc::new(HttpFetcher::new(
            config.fetcher.clone(),
            config.extract.clone(),
        )?);
        let renderer = Arc::new(ChromeRenderer::new(
            config.renderer.clone(),
            config.extract.clone(),
        ));
        let pipeline =
            AcquisitionPipeline::new(config.fetcher.clone(), http, renderer.clone());

        Ok(Self {
            config,
            config_path: None,
            store,
            queue,
            pipeline,
            renderer,
        })
    }

    /// Pool of local workers running the configured worker command
    pub fn worker_pool(&self) -> Result<Arc<WorkerPool>> {
        let pool_config = self.config.pool.clone();
        let launcher: Arc<dyn WorkerLauncher> = match pool_config.worker_program {
            Some(ref program) => {
                let args = if pool_config.worker_args.is_empty() {
                    vec!["worker".to_string()]
                } else {
                    pool_config.worker_args.clone()
                };
                Arc::new(CommandLauncher::new(program, args))
            }
            None => Arc::new(CommandLauncher::current_exe(self.config_path.as_deref())?),
        };
        Ok(Arc::new(WorkerPool::new(
            pool_config,
            launcher,
            self.queue.clone(),
        )))
    }

    pub fn remote_hub(&self) -> Arc<RemoteHub> {
        Arc::new(RemoteHub::new(
            self.queue.clone(),
            self.config.pool.status_poll(),
        ))
    }

    /// Release the browser if the fallback tier ever started one
    pub async fn cleanup(&self) {
        self.renderer.cleanup().await;
    }
}
