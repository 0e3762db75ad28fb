//! Cache Worker Task
//!
//! Runs the cache controller in its own task. The rest of the application
//! reaches it only by sending commands over a channel.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{AssetRequest, CacheController, CacheStats, CachedResponse, Generation};
use crate::error::{InventoryError, Result};

/// Commands queued before the worker applies back-pressure
const COMMAND_BUFFER: usize = 256;

/// A message handled by the cache worker.
#[derive(Debug)]
pub enum CacheCommand {
    Install {
        generation: Generation,
        reply: oneshot::Sender<Result<()>>,
    },
    Activate {
        generation: Generation,
        reply: oneshot::Sender<Result<Vec<String>>>,
    },
    Fetch {
        request: AssetRequest,
        reply: oneshot::Sender<Result<CachedResponse>>,
    },
    Stats {
        reply: oneshot::Sender<CacheStats>,
    },
}

/// Cloneable handle used to talk to the cache worker.
#[derive(Debug, Clone)]
pub struct CacheWorker {
    tx: mpsc::Sender<CacheCommand>,
}

impl CacheWorker {
    pub async fn install(&self, generation: Generation) -> Result<()> {
        self.request(|reply| CacheCommand::Install { generation, reply })
            .await?
    }

    pub async fn activate(&self, generation: Generation) -> Result<Vec<String>> {
        self.request(|reply| CacheCommand::Activate { generation, reply })
            .await?
    }

    /// Installs then activates `generation`. An install failure leaves the
    /// previous generation active.
    pub async fn deploy(&self, generation: Generation) -> Result<Vec<String>> {
        self.install(generation.clone()).await?;
        self.activate(generation).await
    }

    pub async fn fetch(&self, request: AssetRequest) -> Result<CachedResponse> {
        self.request(|reply| CacheCommand::Fetch { request, reply })
            .await?
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        self.request(|reply| CacheCommand::Stats { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> CacheCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| InventoryError::Internal("Cache worker has stopped".to_string()))?;
        rx.await
            .map_err(|_| InventoryError::Internal("Cache worker dropped the request".to_string()))
    }
}

/// Spawns the cache worker around `controller`.
///
/// Install and activate commands are applied in the order received. Each
/// fetch is answered in its own task so a slow network request does not
/// hold up cache hits.
///
/// # Returns
/// The handle for sending commands and the task's JoinHandle, which can be
/// aborted during shutdown.
pub fn spawn_cache_worker(controller: Arc<CacheController>) -> (CacheWorker, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(COMMAND_BUFFER);

    let handle = tokio::spawn(async move {
        info!("Cache worker started for origin {}", controller.origin());

        while let Some(command) = rx.recv().await {
            match command {
                CacheCommand::Install { generation, reply } => {
                    let _ = reply.send(controller.install(&generation).await);
                }
                CacheCommand::Activate { generation, reply } => {
                    let _ = reply.send(controller.activate(&generation).await);
                }
                CacheCommand::Fetch { request, reply } => {
                    let controller = controller.clone();
                    tokio::spawn(async move {
                        let _ = reply.send(controller.handle_fetch(request).await);
                    });
                }
                CacheCommand::Stats { reply } => {
                    let _ = reply.send(controller.stats().await);
                }
            }
        }

        debug!("Cache worker channel closed");
    });

    (CacheWorker { tx }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fetcher::testing::StaticFetcher;
    use crate::cache::CacheStorage;
    use url::Url;

    const ORIGIN: &str = "http://assets.local/";

    fn spawn(fetcher: Arc<StaticFetcher>) -> (CacheWorker, JoinHandle<()>) {
        let controller = CacheController::new(
            Url::parse(ORIGIN).unwrap(),
            CacheStorage::in_memory(),
            fetcher,
        );
        spawn_cache_worker(Arc::new(controller))
    }

    fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    #[tokio::test]
    async fn test_deploy_and_fetch_through_worker() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.serve(url("index.html").as_str(), "home");
        let (worker, handle) = spawn(fetcher.clone());

        worker
            .deploy(Generation::new(1, ["index.html"]))
            .await
            .unwrap();
        fetcher.set_offline(true);

        let response = worker.fetch(AssetRequest::get(url("index.html"))).await.unwrap();
        assert_eq!(response.body, b"home");

        let stats = worker.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.total_entries, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_failed_install_reported() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.set_offline(true);
        let (worker, handle) = spawn(fetcher);

        let result = worker.deploy(Generation::new(1, ["index.html"])).await;
        assert!(matches!(result, Err(InventoryError::Install(_))));

        handle.abort();
    }

    #[tokio::test]
    async fn test_stopped_worker_is_internal_error() {
        let (worker, handle) = spawn(Arc::new(StaticFetcher::new()));
        handle.abort();
        let _ = handle.await;

        let result = worker.stats().await;
        assert!(matches!(result, Err(InventoryError::Internal(_))));
    }
}
