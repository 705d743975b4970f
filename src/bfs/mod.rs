//! Shortest-path engine: layered breadth-first search over a lazily fetched graph.
//!
//! Each search owns a pool of worker tasks that pull pages off a shared work
//! channel, ask the [`LinkSource`] for their outbound links and publish the
//! outcome on a results channel. The driver dispatches a whole frontier, then
//! waits for exactly one result per dispatched page before moving to the next
//! distance. Results inside a layer arrive in any order; layers never overlap.

mod state;

pub use state::{normalize, PageRef, SearchState};

use crate::links::{LinkError, LinkSource};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 1024;

/// Search limits, fixed for the lifetime of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BfsConfig {
    /// Maximum number of hops before the target is declared unreachable.
    pub distance_threshold: u32,
    /// Number of concurrent lookups per search.
    pub worker_count: usize,
}

impl Default for BfsConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 2,
            worker_count: 100,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("worker pool stopped before layer at distance {distance} completed")]
    WorkersGone { distance: u32 },
}

/// Outcome of one lookup, published by a worker.
struct LookupResult {
    page: PageRef,
    edges: Result<Vec<String>, LinkError>,
}

pub struct ShortestPathEngine {
    links: Arc<dyn LinkSource>,
    config: BfsConfig,
}

impl ShortestPathEngine {
    pub fn new(links: Arc<dyn LinkSource>, config: BfsConfig) -> Result<Self, EngineError> {
        if config.worker_count == 0 {
            return Err(EngineError::NoWorkers);
        }
        Ok(Self { links, config })
    }

    /// Find the shortest path from `from` to `to`.
    ///
    /// Returns the normalized titles along the path, both endpoints included, or an
    /// empty vector when `to` is not reachable within the distance threshold.
    /// Failed lookups of individual pages are logged and treated as dead ends.
    pub async fn find_shortest_path(&self, from: &str, to: &str) -> Result<Vec<String>, EngineError> {
        let target = normalize(to);
        let (mut state, root) = SearchState::new(from);

        if root.key == target {
            return Ok(vec![root.key]);
        }

        let (work_tx, work_rx) = mpsc::channel::<PageRef>(CHANNEL_CAPACITY);
        let (result_tx, mut result_rx) = mpsc::channel::<LookupResult>(CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let work_rx = Arc::new(Mutex::new(work_rx));
        let mut workers = JoinSet::new();
        for _ in 0..self.config.worker_count {
            workers.spawn(lookup_worker(
                Arc::clone(&self.links),
                Arc::clone(&work_rx),
                result_tx.clone(),
                shutdown_rx.clone(),
            ));
        }
        // Only workers hold result senders, so a closed channel means the pool is gone
        drop(result_tx);

        let started = Instant::now();
        let outcome = self
            .run_layers(&mut state, root, &target, &work_tx, &mut result_rx, &shutdown_rx)
            .await;

        let _ = shutdown_tx.send(true);
        drop(work_tx);
        while workers.join_next().await.is_some() {}

        let path = outcome?;
        info!(
            from,
            to,
            distance = path.len().saturating_sub(1),
            visited = state.visited_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            found = !path.is_empty(),
            "search finished"
        );
        Ok(path)
    }

    async fn run_layers(
        &self,
        state: &mut SearchState,
        root: PageRef,
        target: &str,
        work_tx: &mpsc::Sender<PageRef>,
        result_rx: &mut mpsc::Receiver<LookupResult>,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<Vec<String>, EngineError> {
        let mut frontier = vec![root];
        let mut distance: u32 = 0;

        loop {
            if state.is_visited(target) {
                return Ok(state.path_to(target));
            }

            distance += 1;
            if distance > self.config.distance_threshold || frontier.is_empty() {
                return Ok(Vec::new());
            }

            let layer_started = Instant::now();
            let expected = frontier.len();
            info!(queue_length = expected, distance, "started a new BFS iteration");

            let dispatcher = tokio::spawn(dispatch(frontier, work_tx.clone(), shutdown.clone()));

            let mut next = Vec::new();
            for _ in 0..expected {
                let Some(result) = result_rx.recv().await else {
                    dispatcher.abort();
                    return Err(EngineError::WorkersGone { distance });
                };

                match result.edges {
                    Err(e) => {
                        warn!(page = %result.page.title, error = %e, "failed to get edges");
                    }
                    Ok(edges) => {
                        for edge in &edges {
                            if let Some(page) = state.visit(&result.page.key, edge) {
                                next.push(page);
                            }
                        }
                    }
                }
            }

            let _ = dispatcher.await;

            debug!(
                distance,
                discovered = next.len(),
                elapsed_ms = layer_started.elapsed().as_millis() as u64,
                "finished BFS iteration"
            );
            frontier = next;
        }
    }
}

async fn dispatch(
    frontier: Vec<PageRef>,
    work: mpsc::Sender<PageRef>,
    mut shutdown: watch::Receiver<bool>,
) {
    for page in frontier {
        tokio::select! {
            _ = shutdown.changed() => return,
            sent = work.send(page) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

async fn lookup_worker(
    links: Arc<dyn LinkSource>,
    work: Arc<Mutex<mpsc::Receiver<PageRef>>>,
    results: mpsc::Sender<LookupResult>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let page = {
            let mut work = work.lock().await;
            tokio::select! {
                _ = shutdown.changed() => return,
                page = work.recv() => match page {
                    Some(page) => page,
                    None => return,
                },
            }
        };

        let edges = tokio::select! {
            _ = shutdown.changed() => return,
            edges = links.get_edges(&page.title) => edges,
        };

        tokio::select! {
            _ = shutdown.changed() => return,
            sent = results.send(LookupResult { page, edges }) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}
