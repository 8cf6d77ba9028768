//! Subgraph Client - Pool Records from The Graph
//!
//! Pages through the exchange's `liquidityPools` ordered by swap count and
//! turns the raw GraphQL payload into typed `PoolRecord`s.

use alloy_primitives::Address;
use async_trait::async_trait;
use eyre::{eyre, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, trace};

// ============================================
// CONSTANTS
// ============================================

/// Timeout for a single page request
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Fee type carrying the pool's swap fee in the Messari schema
const TRADING_FEE_TYPE: &str = "FIXED_TRADING_FEE";

// ============================================
// TYPES
// ============================================

/// Token side of a pool record
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRecord {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Last known USD price, if the indexer has one
    pub price_usd: Option<f64>,
}

impl TokenRecord {
    /// `name/symbol` display label
    pub fn label(&self) -> String {
        format!("{}/{}", self.name, self.symbol)
    }
}

/// A pool as reported by the indexing service
#[derive(Debug, Clone, PartialEq)]
pub struct PoolRecord {
    pub address: Address,
    pub token0: TokenRecord,
    pub token1: TokenRecord,
    /// Fee tier in hundredths of a bip (500 = 0.05%)
    pub fee: u32,
}

/// Source of paginated pool records
#[async_trait]
pub trait PoolSource: Send + Sync {
    /// Fetch page `page` (zero based) of `page_size` records
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Vec<PoolRecord>>;
}

// ============================================
// GRAPHQL RESPONSE TYPES
// ============================================

#[derive(Debug, Serialize)]
struct GraphQuery {
    query: String,
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<PoolsData>,
    errors: Option<Vec<GraphError>>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PoolsData {
    #[serde(rename = "liquidityPools")]
    liquidity_pools: Vec<RawPool>,
}

#[derive(Debug, Deserialize)]
struct RawPool {
    id: String,
    fees: Vec<RawFee>,
    #[serde(rename = "inputTokens")]
    input_tokens: Vec<RawToken>,
}

#[derive(Debug, Deserialize)]
struct RawFee {
    #[serde(rename = "feeType")]
    fee_type: Option<String>,
    #[serde(rename = "feePercentage")]
    fee_percentage: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawToken {
    id: String,
    name: String,
    symbol: String,
    decimals: u8,
    #[serde(rename = "lastPriceUSD")]
    last_price_usd: Option<String>,
}

// ============================================
// CLIENT
// ============================================

/// GraphQL client for the exchange subgraph
pub struct SubgraphClient {
    endpoint: String,
    client: Client,
}

impl SubgraphClient {
    pub fn new(endpoint: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { endpoint, client })
    }

    /// Pools query for one page, most active pools first
    pub fn pools_query(page: usize, page_size: usize) -> String {
        format!(
            r#"{{
                liquidityPools(
                    first: {first},
                    skip: {skip},
                    orderBy: cumulativeSwapCount,
                    orderDirection: desc
                ) {{
                    id
                    fees {{
                        feeType
                        feePercentage
                    }}
                    inputTokens {{
                        id
                        name
                        symbol
                        decimals
                        lastPriceUSD
                    }}
                }}
            }}"#,
            first = page_size,
            skip = page * page_size,
        )
    }
}

#[async_trait]
impl PoolSource for SubgraphClient {
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Vec<PoolRecord>> {
        let body = GraphQuery {
            query: Self::pools_query(page, page_size),
        };

        let response: GraphResponse = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_response(response)
    }
}

fn parse_response(response: GraphResponse) -> Result<Vec<PoolRecord>> {
    if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
        let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
        return Err(eyre!("Subgraph returned errors: {}", messages.join("; ")));
    }

    let data = response
        .data
        .ok_or_else(|| eyre!("Subgraph response has no data"))?;

    let mut records = Vec::with_capacity(data.liquidity_pools.len());
    for raw in data.liquidity_pools {
        match convert_pool(&raw) {
            Some(record) => records.push(record),
            None => trace!("Skipping malformed pool record {}", raw.id),
        }
    }

    debug!("Parsed {} pool records", records.len());
    Ok(records)
}

fn convert_pool(raw: &RawPool) -> Option<PoolRecord> {
    if raw.input_tokens.len() != 2 {
        return None;
    }

    Some(PoolRecord {
        address: Address::from_str(&raw.id).ok()?,
        token0: convert_token(&raw.input_tokens[0])?,
        token1: convert_token(&raw.input_tokens[1])?,
        fee: fee_tier(&raw.fees)?,
    })
}

fn convert_token(raw: &RawToken) -> Option<TokenRecord> {
    Some(TokenRecord {
        address: Address::from_str(&raw.id).ok()?,
        name: raw.name.clone(),
        symbol: raw.symbol.clone(),
        decimals: raw.decimals,
        price_usd: raw
            .last_price_usd
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .filter(|p| p.is_finite()),
    })
}

/// Trading fee tier from the fee list: the fixed trading fee when tagged,
/// otherwise the largest percentage. `0.05` (%) becomes tier `500`.
fn fee_tier(fees: &[RawFee]) -> Option<u32> {
    let percentage = |fee: &RawFee| {
        fee.fee_percentage
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .filter(|p| p.is_finite() && *p >= 0.0)
    };

    let tagged = fees
        .iter()
        .find(|f| f.fee_type.as_deref() == Some(TRADING_FEE_TYPE))
        .and_then(percentage);

    let pct = tagged.or_else(|| {
        fees.iter()
            .filter_map(percentage)
            .fold(None, |best: Option<f64>, p| Some(best.map_or(p, |b| b.max(p))))
    })?;

    Some((pct * 10_000.0).round() as u32)
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "data": {
            "liquidityPools": [
                {
                    "id": "0xc31e54c7a869b9fcbecc14363cf510d1c41fa443",
                    "fees": [
                        { "feeType": "FIXED_LP_FEE", "feePercentage": "0.05" },
                        { "feeType": "FIXED_TRADING_FEE", "feePercentage": "0.05" },
                        { "feeType": "FIXED_PROTOCOL_FEE", "feePercentage": "0" }
                    ],
                    "inputTokens": [
                        { "id": "0x82af49447d8a07e3bd95bd0d56f35241523fbab1", "name": "Wrapped Ether", "symbol": "WETH", "decimals": 18, "lastPriceUSD": "3012.55" },
                        { "id": "0xff970a61a04b1ca14834a43f5de4533ebddb5cc8", "name": "USD Coin (Arb1)", "symbol": "USDC", "decimals": 6, "lastPriceUSD": "1.0001" }
                    ]
                },
                {
                    "id": "not-an-address",
                    "fees": [],
                    "inputTokens": []
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_pools_page() {
        let response: GraphResponse = serde_json::from_str(SAMPLE).unwrap();
        let records = parse_response(response).unwrap();

        assert_eq!(records.len(), 1);
        let pool = &records[0];
        assert_eq!(pool.fee, 500);
        assert_eq!(pool.token0.symbol, "WETH");
        assert_eq!(pool.token0.label(), "Wrapped Ether/WETH");
        assert_eq!(pool.token1.decimals, 6);
        assert_eq!(pool.token1.price_usd, Some(1.0001));
    }

    #[test]
    fn test_graphql_errors_fail_the_page() {
        let response: GraphResponse = serde_json::from_str(
            r#"{ "errors": [ { "message": "indexer unavailable" } ] }"#,
        )
        .unwrap();
        let err = parse_response(response).unwrap_err();
        assert!(err.to_string().contains("indexer unavailable"));

        let empty: GraphResponse = serde_json::from_str("{}").unwrap();
        assert!(parse_response(empty).is_err());
    }

    #[test]
    fn test_fee_tier_fallback_to_largest() {
        let fees = vec![
            RawFee { fee_type: None, fee_percentage: Some("0.01".to_string()) },
            RawFee { fee_type: None, fee_percentage: Some("0.3".to_string()) },
        ];
        assert_eq!(fee_tier(&fees), Some(3000));
        assert_eq!(fee_tier(&[]), None);
    }

    #[test]
    fn test_pools_query_pagination() {
        let query = SubgraphClient::pools_query(2, 100);
        assert!(query.contains("first: 100"));
        assert!(query.contains("skip: 200"));
        assert!(query.contains("orderBy: cumulativeSwapCount"));
    }
}
