//! Quote Scanner - the hot loop
//!
//! The cached paths are split into one contiguous slice per worker. Every
//! worker re-quotes its slice forever; a path whose adjusted output clears
//! the profit bound is pushed to the executor over an unbounded channel and
//! the worker moves straight on.

use alloy_primitives::{
    utils::{format_units, parse_units},
    U256,
};
use chrono::{DateTime, Utc};
use eyre::{eyre, Result};
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::quoter::PathQuoter;
use crate::brain::ArbPath;
use crate::config::Config;

// ============================================
// PURE SCORING
// ============================================

/// `workers` contiguous ranges of `ceil(total / workers)` items covering `0..total`
pub fn partition(total: usize, workers: usize) -> Vec<Range<usize>> {
    if workers == 0 {
        return Vec::new();
    }
    let chunk = total.div_ceil(workers);
    (0..workers)
        .map(|i| {
            let start = (i * chunk).min(total);
            let end = ((i + 1) * chunk).min(total);
            start..end
        })
        .collect()
}

/// Quote after per-hop decay and the flat slippage margin
pub fn adjusted_output(raw: f64, hops: usize, decay: f64, slippage: f64) -> f64 {
    raw * decay.powi(hops as i32) * (1.0 - slippage)
}

pub fn profit_bound(amount_in: f64, threshold: f64) -> f64 {
    amount_in * (1.0 + threshold)
}

pub fn is_profitable(adjusted: f64, amount_in: f64, threshold: f64) -> bool {
    adjusted > profit_bound(amount_in, threshold)
}

fn to_units(amount: U256, decimals: u8) -> f64 {
    format_units(amount, decimals)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}

// ============================================
// TYPES
// ============================================

/// Scoring parameters shared by every worker
#[derive(Debug, Clone)]
pub struct ScanParams {
    /// Input in whole start-token units
    pub amount_in: f64,
    /// Same input in the token's smallest unit
    pub amount_in_raw: U256,
    pub decimals: u8,
    pub threshold: f64,
    pub slippage: f64,
    pub decay: f64,
    pub progress_interval: usize,
}

impl ScanParams {
    pub fn new(amount_in: f64, decimals: u8) -> Result<Self> {
        let amount_in_raw = parse_units(&amount_in.to_string(), decimals)
            .map_err(|e| eyre!("Invalid input amount {}: {}", amount_in, e))?
            .get_absolute();

        Ok(Self {
            amount_in,
            amount_in_raw,
            decimals,
            threshold: 0.005,
            slippage: 0.01,
            decay: 0.9975,
            progress_interval: 500,
        })
    }

    pub fn from_config(config: &Config, decimals: u8) -> Result<Self> {
        let mut params = Self::new(config.amount_in, decimals)?;
        params.threshold = config.threshold;
        params.slippage = config.slippage;
        params.decay = config.decay_factor;
        params.progress_interval = config.progress_interval;
        Ok(params)
    }

    pub fn bound(&self) -> f64 {
        profit_bound(self.amount_in, self.threshold)
    }
}

/// A path handed to a worker together with its labels
#[derive(Debug, Clone)]
pub struct ScanTarget {
    pub path: ArbPath,
    pub readable: Vec<String>,
}

/// Sent to the executor when a path clears the bound
#[derive(Debug, Clone)]
pub struct ProfitableRoute {
    pub worker_id: usize,
    pub path: ArbPath,
    pub readable: Vec<String>,
    /// Adjusted output in whole start-token units
    pub adjusted_output: f64,
    pub amount_in: f64,
    pub amount_in_raw: U256,
    pub raw_output: U256,
    pub decimals: u8,
    pub detected_at: DateTime<Utc>,
}

impl ProfitableRoute {
    pub fn profit_pct(&self) -> f64 {
        (self.adjusted_output / self.amount_in - 1.0) * 100.0
    }

    /// Adjusted output in the token's smallest unit
    pub fn min_output_raw(&self) -> Result<U256> {
        let rounded = format!("{:.*}", self.decimals as usize, self.adjusted_output);
        Ok(parse_units(&rounded, self.decimals)?.get_absolute())
    }
}

/// Outcome of one sweep over a worker's slice
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub worker_id: usize,
    pub pass: u64,
    pub quoted: usize,
    pub failed: usize,
    pub profitable: usize,
    pub elapsed: Duration,
}

// ============================================
// SCANNER
// ============================================

pub struct QuoteScanner {
    quoter: Arc<dyn PathQuoter>,
    params: ScanParams,
    events: UnboundedSender<ProfitableRoute>,
}

impl QuoteScanner {
    pub fn new(
        quoter: Arc<dyn PathQuoter>,
        params: ScanParams,
        events: UnboundedSender<ProfitableRoute>,
    ) -> Self {
        Self {
            quoter,
            params,
            events,
        }
    }

    /// Split `targets` into `worker_count` slices and give each its own task
    pub fn workers(&self, targets: Vec<ScanTarget>, worker_count: usize) -> Vec<Worker> {
        let ranges = partition(targets.len(), worker_count);
        let mut remaining = targets;
        let mut workers = Vec::with_capacity(ranges.len());

        // Peel slices off the back so each worker owns its paths
        for (id, range) in ranges.into_iter().enumerate().rev() {
            let slice = remaining.split_off(range.start);
            if slice.is_empty() {
                continue;
            }
            workers.push(Worker {
                id,
                quoter: Arc::clone(&self.quoter),
                params: self.params.clone(),
                events: self.events.clone(),
                targets: slice,
                passes: 0,
            });
        }

        workers.reverse();
        workers
    }

    pub fn spawn_workers(&self, targets: Vec<ScanTarget>, worker_count: usize) -> Vec<JoinHandle<()>> {
        let total = targets.len();
        let workers = self.workers(targets, worker_count);

        info!(
            "Spawning {} scan workers over {} paths (bound {:.6})",
            workers.len(),
            total,
            self.params.bound()
        );

        workers
            .into_iter()
            .map(|worker| tokio::spawn(worker.run()))
            .collect()
    }
}

pub struct Worker {
    id: usize,
    quoter: Arc<dyn PathQuoter>,
    params: ScanParams,
    events: UnboundedSender<ProfitableRoute>,
    targets: Vec<ScanTarget>,
    passes: u64,
}

impl Worker {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Never returns
    pub async fn run(mut self) {
        debug!("Worker {} started with {} paths", self.id, self.targets.len());
        loop {
            let report = self.scan_pass().await;
            info!(
                "Worker {} pass {}: {} quoted, {} failed, {} profitable in {:?}",
                report.worker_id,
                report.pass,
                report.quoted,
                report.failed,
                report.profitable,
                report.elapsed
            );
        }
    }

    pub async fn scan_pass(&mut self) -> PassReport {
        self.passes += 1;
        let start = Instant::now();
        let mut report = PassReport {
            worker_id: self.id,
            pass: self.passes,
            ..Default::default()
        };

        for (index, target) in self.targets.iter().enumerate() {
            if self.params.progress_interval > 0 && index > 0 && index % self.params.progress_interval == 0 {
                info!(
                    "Worker {} still searching... ({}/{})",
                    self.id,
                    index,
                    self.targets.len()
                );
            }

            let raw = match self.quoter.quote(&target.path, self.params.amount_in_raw).await {
                Ok(raw) => raw,
                Err(e) => {
                    report.failed += 1;
                    debug!(
                        "Worker {}: quote failed ({}) for {}: {}",
                        self.id,
                        e.class(),
                        target.readable.join(" -> "),
                        e
                    );
                    continue;
                }
            };
            report.quoted += 1;

            let adjusted = adjusted_output(
                to_units(raw, self.params.decimals),
                target.path.hop_count(),
                self.params.decay,
                self.params.slippage,
            );

            if !is_profitable(adjusted, self.params.amount_in, self.params.threshold) {
                continue;
            }

            report.profitable += 1;
            info!(
                "Worker {} found route: {} -> {:.6} (in {})",
                self.id,
                target.readable.join(" -> "),
                adjusted,
                self.params.amount_in
            );

            let route = ProfitableRoute {
                worker_id: self.id,
                path: target.path.clone(),
                readable: target.readable.clone(),
                adjusted_output: adjusted,
                amount_in: self.params.amount_in,
                amount_in_raw: self.params.amount_in_raw,
                raw_output: raw,
                decimals: self.params.decimals,
                detected_at: Utc::now(),
            };
            if self.events.send(route).is_err() {
                warn!("Worker {}: executor channel closed, route dropped", self.id);
            }
        }

        report.elapsed = start.elapsed();
        report
    }
}

// ============================================
// TESTS
// ============================================
