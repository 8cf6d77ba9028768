//! Graph Refresh - Fetch, Filter, Build
//!
//! Pages through the pool source, admits pools through the validator and
//! builds a fresh `PoolGraph`. A failed page, or a pass that admits no pool
//! at all, throws the graph away and starts over, for a bounded number of
//! attempts.

use eyre::{eyre, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::graph::PoolGraph;
use super::liquidity::PoolValidator;
use super::subgraph::PoolSource;

/// Builds the pool graph from a pool source and a validator
pub struct GraphRefresher<S, V> {
    source: S,
    validator: V,
    page_size: usize,
    page_count: usize,
    attempts: u32,
    concurrency: usize,
    show_progress: bool,
}

impl<S: PoolSource, V: PoolValidator> GraphRefresher<S, V> {
    pub fn new(source: S, validator: V) -> Self {
        Self {
            source,
            validator,
            page_size: 100,
            page_count: 5,
            attempts: 3,
            concurrency: 8,
            show_progress: true,
        }
    }

    pub fn with_pages(mut self, page_count: usize, page_size: usize) -> Self {
        self.page_count = page_count;
        self.page_size = page_size;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Build the graph, retrying the whole fetch on any page failure or when
    /// nothing was admitted
    pub async fn refresh(&self) -> Result<PoolGraph> {
        let start = Instant::now();

        for attempt in 1..=self.attempts {
            match self.build_once().await {
                // Every pool rejected, retried like a failed page
                Ok(graph) if graph.edge_count() == 0 => {
                    warn!(
                        "No pools passed the liquidity filter (attempt {}/{})",
                        attempt, self.attempts
                    );
                }
                Ok(graph) => {
                    info!(
                        "Pool graph refreshed in {:?} (attempt {}/{})",
                        start.elapsed(),
                        attempt,
                        self.attempts
                    );
                    graph.log_summary();
                    return Ok(graph);
                }
                Err(e) => {
                    warn!(
                        "Pool data fetch failed (attempt {}/{}): {}",
                        attempt, self.attempts, e
                    );
                }
            }
        }

        Err(eyre!(
            "Failed to fetch pool data after {} attempts",
            self.attempts
        ))
    }

    async fn build_once(&self) -> Result<PoolGraph> {
        let mut graph = PoolGraph::new();
        let progress = self.progress_bar();
        let (mut seen, mut admitted) = (0usize, 0usize);

        for page in 0..self.page_count {
            progress.set_message(format!("page {}/{}", page + 1, self.page_count));

            let records = match self.source.fetch_page(page, self.page_size).await {
                Ok(records) => records,
                Err(e) => {
                    progress.abandon_with_message("fetch failed");
                    return Err(e);
                }
            };
            seen += records.len();

            let decisions: Vec<bool> = stream::iter(records.iter())
                .map(|record| self.validator.admit(record))
                .buffered(self.concurrency)
                .collect()
                .await;

            for (record, admit) in records.iter().zip(decisions) {
                if admit && graph.add_pool(record) {
                    admitted += 1;
                }
            }

            debug!(
                "Page {}: {} records, {} pools admitted so far",
                page, records.len(), admitted
            );
            progress.inc(1);

            // Short page means the index is exhausted
            if records.len() < self.page_size {
                break;
            }
        }

        progress.finish_with_message(format!("{} of {} pools admitted", admitted, seen));
        Ok(graph)
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(self.page_count as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb
    }
}

// ============================================
// TESTS
// ============================================
