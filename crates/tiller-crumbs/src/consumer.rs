//! Background task folding buffered poses into the crumb graph.

use crate::graph::{CrumbGraph, Drained};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Handle to the running consumer.
pub struct CrumbConsumer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl CrumbConsumer {
    /// Start draining `graph` on the current runtime.
    pub fn spawn(graph: Arc<CrumbGraph>) -> Self {
        Self::spawn_with_token(graph, CancellationToken::new())
    }

    /// Start draining, stopping when `token` (or a parent of it) is cancelled.
    pub fn spawn_with_token(graph: Arc<CrumbGraph>, token: CancellationToken) -> Self {
        let handle = tokio::spawn(run(graph, token.clone()));
        info!("Crumb consumer started");
        Self { token, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the consumer and wait for its current pass to finish.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            error!(error = %e, "Crumb consumer ended abnormally");
        }
        info!("Crumb consumer stopped");
    }
}

async fn run(graph: Arc<CrumbGraph>, token: CancellationToken) {
    let backoff = graph.config().idle_backoff();

    loop {
        if token.is_cancelled() {
            break;
        }

        let worker = Arc::clone(&graph);
        let outcome = tokio::task::spawn_blocking(move || worker.drain_one()).await;

        let idle = match outcome {
            Ok(Ok(Drained::Empty)) => true,
            Ok(Ok(Drained::Inserted(id))) => {
                debug!(crumb = %id, "Consumer inserted crumb");
                false
            }
            Ok(Ok(Drained::Skipped)) => false,
            Ok(Err(e)) => {
                error!(error = %e, "Crumb insertion failed");
                true
            }
            Err(e) => {
                error!(error = %e, "Crumb insertion task failed");
                true
            }
        };

        if idle {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
        } else {
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::at;
    use std::time::Duration;
    use tiller_core::CrumbConfig;

    fn graph() -> Arc<CrumbGraph> {
        Arc::new(CrumbGraph::new(CrumbConfig {
            idle_backoff_ms: 10,
            ..CrumbConfig::default()
        }))
    }

    async fn wait_for_crumbs(graph: &CrumbGraph, count: usize) {
        for _ in 0..200 {
            if graph.len().unwrap() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("graph never reached {count} crumbs");
    }

    #[tokio::test]
    async fn test_consumer_drains_buffer() {
        let graph = graph();
        let consumer = CrumbConsumer::spawn(graph.clone());

        for east in [0.0, 4.0, 8.0] {
            graph.submit_pose(at(east, 0.0)).unwrap();
        }
        wait_for_crumbs(&graph, 3).await;
        assert_eq!(graph.buffered().unwrap(), 0);

        // Poses arriving after an idle period are still picked up
        tokio::time::sleep(Duration::from_millis(30)).await;
        graph.submit_pose(at(12.0, 0.0)).unwrap();
        wait_for_crumbs(&graph, 4).await;

        assert!(consumer.is_running());
        consumer.stop().await;
    }

    #[tokio::test]
    async fn test_consumer_stops_on_parent_token() {
        let graph = graph();
        let parent = CancellationToken::new();
        let consumer = CrumbConsumer::spawn_with_token(graph.clone(), parent.child_token());

        parent.cancel();
        for _ in 0..200 {
            if !consumer.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!consumer.is_running());

        graph.submit_pose(at(0.0, 0.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(graph.buffered().unwrap(), 1);
    }
}
