//! Phase 1: The Cartographer (Data Ingest)
//!
//! Responsible for:
//! - Paging pool records out of the exchange subgraph
//! - Admitting only pools with enough USD liquidity
//! - Building the token/fee-tier pool graph

pub mod graph;
pub mod liquidity;
pub mod refresh;
pub mod subgraph;

pub use graph::{PoolEdge, PoolGraph, Token};
pub use liquidity::{OnChainValidator, PoolValidator};
pub use refresh::GraphRefresher;
pub use subgraph::{PoolRecord, PoolSource, SubgraphClient, TokenRecord};
