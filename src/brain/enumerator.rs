//! Cycle Enumerator
//!
//! Step 2.1: The Pathfinder
//!
//! Depth-first backtracking from the start token over the pool graph. A
//! token may be visited more than once, but a hop never re-uses the fee
//! tier that already carried the path into that token:
//!
//! - closing hop `P -> start`: drop a fee if some visit of `P` was reached
//!   straight from the start token with that fee (the same pool walked
//!   backwards)
//! - interior hop `P -> N`: drop a fee only if an earlier visit of `N` was
//!   reached from `P` with that same fee
//!
//! Interior hops never go through the start token. Output order follows the
//! graph's edge order, so it is stable for a given graph.

use alloy_primitives::Address;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::path::ArbPath;
use crate::cartographer::PoolGraph;

pub struct PathEnumerator<'a> {
    graph: &'a PoolGraph,
    start: Address,
}

impl<'a> PathEnumerator<'a> {
    pub fn new(graph: &'a PoolGraph, start: Address) -> Self {
        Self { graph, start }
    }

    /// Every cycle of 1 to `max_hops` hops
    pub fn enumerate(&self, max_hops: usize) -> Vec<ArbPath> {
        if !self.graph.contains(&self.start) {
            warn!("Start token {:?} is not in the pool graph", self.start);
            return Vec::new();
        }

        let started = Instant::now();
        let mut paths = Vec::new();

        for hops in 1..=max_hops {
            let before = paths.len();
            self.search(&ArbPath::new(self.start), hops, &mut paths);
            debug!("{} paths with {} hops", paths.len() - before, hops);
        }

        info!(
            "Enumerated {} cycles up to {} hops in {:?}",
            paths.len(),
            max_hops,
            started.elapsed()
        );
        paths
    }

    /// Every cycle of exactly `hops` hops
    pub fn enumerate_exact(&self, hops: usize) -> Vec<ArbPath> {
        let mut paths = Vec::new();
        if hops == 0 {
            return paths;
        }
        if !self.graph.contains(&self.start) {
            warn!("Start token {:?} is not in the pool graph", self.start);
            return paths;
        }

        self.search(&ArbPath::new(self.start), hops, &mut paths);
        paths
    }

    fn search(&self, path: &ArbPath, budget: usize, out: &mut Vec<ArbPath>) {
        let current = path.last_token();

        if budget == 1 {
            for fee in self.closing_fees(path, current) {
                out.push(path.extended(fee, self.start));
            }
            return;
        }

        for (neighbor, edge) in self.graph.neighbors(&current) {
            if neighbor == self.start || arrived_from_with(path, current, neighbor, edge.fee) {
                continue;
            }
            self.search(&path.extended(edge.fee, neighbor), budget - 1, out);
        }
    }

    /// Fees from `current` back to the start, minus pools the path already
    /// took from the start into `current`
    fn closing_fees(&self, path: &ArbPath, current: Address) -> Vec<u32> {
        let mut fees = self.graph.fees_between(&current, &self.start);
        fees.retain(|fee| !arrived_from_with(path, self.start, current, *fee));
        fees
    }
}

/// Was `token` reached from `from` with `fee` anywhere in `path`
fn arrived_from_with(path: &ArbPath, from: Address, token: Address, fee: u32) -> bool {
    path.arrivals()
        .any(|(prev, f, t)| t == token && prev == from && f == fee)
}

// ============================================
// TESTS
// ============================================
