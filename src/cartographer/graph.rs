//! Pool Graph - Token/Fee-Tier Multigraph
//!
//! Every token is a node. Every admitted pool adds one undirected edge
//! between its two tokens, so the same pair may be connected several times
//! (one pool per fee tier).
//!
//! The graph is built once per refresh and only read afterwards.

use alloy_primitives::Address;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};
use tracing::info;

use super::subgraph::{PoolRecord, TokenRecord};
use crate::brain::ArbPath;

/// Token details kept per node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub address: Address,
    pub decimals: u8,
    /// `name/symbol`
    pub label: String,
}

impl From<&TokenRecord> for Token {
    fn from(record: &TokenRecord) -> Self {
        Self {
            address: record.address,
            decimals: record.decimals,
            label: record.label(),
        }
    }
}

/// Edge data: one pool between two tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolEdge {
    pub fee: u32,
    pub pool: Address,
}

/// The token/pool graph
#[derive(Debug, Clone, Default)]
pub struct PoolGraph {
    graph: UnGraph<Token, PoolEdge>,
    token_to_node: HashMap<Address, NodeIndex>,
}

impl PoolGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an admitted pool. Returns false if it added nothing new.
    pub fn add_pool(&mut self, pool: &PoolRecord) -> bool {
        if pool.token0.address == pool.token1.address {
            return false;
        }

        let node0 = self.get_or_create_node(&pool.token0);
        let node1 = self.get_or_create_node(&pool.token1);

        // A (pair, fee tier) combination is stored at most once
        if self.edges_between(node0, node1).any(|e| e.fee == pool.fee) {
            return false;
        }

        self.graph.add_edge(
            node0,
            node1,
            PoolEdge {
                fee: pool.fee,
                pool: pool.address,
            },
        );
        true
    }

    fn get_or_create_node(&mut self, token: &TokenRecord) -> NodeIndex {
        if let Some(&node) = self.token_to_node.get(&token.address) {
            return node;
        }
        let node = self.graph.add_node(Token::from(token));
        self.token_to_node.insert(token.address, node);
        node
    }

    /// Edges touching `node`, paired with the node on the far side
    fn incident(&self, node: NodeIndex) -> impl Iterator<Item = (NodeIndex, &PoolEdge)> + '_ {
        self.graph.edges(node).map(move |e| {
            let other = if e.source() == node { e.target() } else { e.source() };
            (other, &self.graph[e.id()])
        })
    }

    fn edges_between(&self, a: NodeIndex, b: NodeIndex) -> impl Iterator<Item = &PoolEdge> + '_ {
        self.incident(a)
            .filter(move |(other, _)| *other == b)
            .map(|(_, edge)| edge)
    }

    fn node_pair(&self, a: &Address, b: &Address) -> Option<(NodeIndex, NodeIndex)> {
        Some((*self.token_to_node.get(a)?, *self.token_to_node.get(b)?))
    }

    pub fn contains(&self, token: &Address) -> bool {
        self.token_to_node.contains_key(token)
    }

    pub fn token(&self, token: &Address) -> Option<&Token> {
        self.token_to_node.get(token).map(|&node| &self.graph[node])
    }

    /// Every pool leading away from `token`, with the token it leads to
    pub fn neighbors(&self, token: &Address) -> impl Iterator<Item = (Address, &PoolEdge)> + '_ {
        let node = self.token_to_node.get(token).copied();
        node.into_iter()
            .flat_map(move |n| self.incident(n))
            .map(move |(other, edge)| (self.graph[other].address, edge))
    }

    /// Fee tiers of every pool between `a` and `b`, ascending
    pub fn fees_between(&self, a: &Address, b: &Address) -> Vec<u32> {
        let Some((na, nb)) = self.node_pair(a, b) else {
            return Vec::new();
        };
        let mut fees: Vec<u32> = self.edges_between(na, nb).map(|e| e.fee).collect();
        fees.sort_unstable();
        fees
    }

    /// Pool contract for the `a`-`b` pair at `fee`
    pub fn pool_address(&self, a: &Address, b: &Address, fee: u32) -> Option<Address> {
        let (na, nb) = self.node_pair(a, b)?;
        self.edges_between(na, nb)
            .find(|e| e.fee == fee)
            .map(|e| e.pool)
    }

    pub fn token_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct (pair, fee) edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Display label for a token, short address if unknown
    pub fn label(&self, token: &Address) -> String {
        self.token(token)
            .map(|t| t.label.clone())
            .unwrap_or_else(|| short_address(token))
    }

    /// Labels for each token of `path`, same length as its token sequence
    pub fn readable_path(&self, path: &ArbPath) -> Vec<String> {
        path.tokens().map(|t| self.label(&t)).collect()
    }

    pub fn readable_paths(&self, paths: &[ArbPath]) -> Vec<Vec<String>> {
        paths.iter().map(|p| self.readable_path(p)).collect()
    }

    pub fn log_summary(&self) {
        let max_degree = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors(n).collect::<HashSet<_>>().len())
            .max()
            .unwrap_or(0);

        info!(
            "Graph built: {} tokens, {} pool edges (max degree {})",
            self.token_count(),
            self.edge_count(),
            max_degree
        );
    }
}

pub fn short_address(address: &Address) -> String {
    let full = format!("{:?}", address);
    format!("{}...", &full[..8])
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn token(byte: u8, symbol: &str) -> TokenRecord {
        TokenRecord {
            address: Address::repeat_byte(byte),
            name: format!("{} Token", symbol),
            symbol: symbol.to_string(),
            decimals: 18,
            price_usd: Some(1.0),
        }
    }

    pub(crate) fn pool(pool_byte: u8, a: &TokenRecord, b: &TokenRecord, fee: u32) -> PoolRecord {
        PoolRecord {
            address: Address::repeat_byte(pool_byte),
            token0: a.clone(),
            token1: b.clone(),
            fee,
        }
    }

    #[test]
    fn test_edges_are_symmetric() {
        let (a, b) = (token(1, "A"), token(2, "B"));
        let mut graph = PoolGraph::new();

        assert!(graph.add_pool(&pool(0xa0, &a, &b, 500)));
        assert!(graph.add_pool(&pool(0xa1, &a, &b, 3000)));

        assert_eq!(graph.fees_between(&a.address, &b.address), vec![500, 3000]);
        assert_eq!(graph.fees_between(&b.address, &a.address), vec![500, 3000]);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.token_count(), 2);
        assert_eq!(
            graph.pool_address(&b.address, &a.address, 3000),
            Some(Address::repeat_byte(0xa1))
        );
    }

    #[test]
    fn test_duplicate_fee_tier_is_stored_once() {
        let (a, b) = (token(1, "A"), token(2, "B"));
        let mut graph = PoolGraph::new();

        assert!(graph.add_pool(&pool(0xa0, &a, &b, 500)));
        // Same pair and tier reported again (either orientation)
        assert!(!graph.add_pool(&pool(0xa0, &b, &a, 500)));

        assert_eq!(graph.fees_between(&a.address, &b.address), vec![500]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_neighbors_list_every_pool() {
        let (a, b, c) = (token(1, "A"), token(2, "B"), token(3, "C"));
        let mut graph = PoolGraph::new();
        graph.add_pool(&pool(0xa0, &a, &b, 500));
        graph.add_pool(&pool(0xa1, &a, &b, 3000));
        graph.add_pool(&pool(0xa2, &c, &b, 100));

        let mut from_b: Vec<(Address, u32)> = graph
            .neighbors(&b.address)
            .map(|(n, edge)| (n, edge.fee))
            .collect();
        from_b.sort();
        assert_eq!(
            from_b,
            vec![(a.address, 500), (a.address, 3000), (c.address, 100)]
        );

        assert_eq!(graph.neighbors(&a.address).count(), 2);
        assert_eq!(graph.neighbors(&Address::repeat_byte(9)).count(), 0);
    }

    #[test]
    fn test_self_pool_rejected() {
        let a = token(1, "A");
        let mut graph = PoolGraph::new();
        assert!(!graph.add_pool(&pool(0xa0, &a, &a, 500)));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_readable_path_falls_back_to_short_address() {
        let (a, b) = (token(1, "A"), token(2, "B"));
        let mut graph = PoolGraph::new();
        graph.add_pool(&pool(0xa0, &a, &b, 500));

        let unknown = Address::repeat_byte(9);
        let path = ArbPath::new(a.address)
            .extended(500, b.address)
            .extended(100, unknown)
            .extended(100, a.address);

        let readable = graph.readable_path(&path);
        assert_eq!(readable.len(), path.hop_count() + 1);
        assert_eq!(readable[0], "A Token/A");
        assert_eq!(readable[1], "B Token/B");
        assert_eq!(readable[2], "0x090909...");
    }
}
