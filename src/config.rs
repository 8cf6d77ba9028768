//! Runtime Configuration
//!
//! Every parameter of a run lives here: where pool data comes from, which
//! asset the cycles start from, how the scan loop scores quotes, and how a
//! winning route gets submitted.
//!
//! Values come from environment variables (and a `.env` file) or from a
//! TOML file passed with `--config`.

use alloy_primitives::Address;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

// ============================================
// EXECUTION MODE
// ============================================

/// Decides what happens when a profitable route is found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExecutionMode {
    /// Log the route (and append it to the opportunity log), never submit
    #[default]
    Simulation,

    /// Sign and submit the swap through the router
    /// CAUTION: This uses real funds!
    Production,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Simulation => write!(f, "SIMULATION"),
            ExecutionMode::Production => write!(f, "PRODUCTION"),
        }
    }
}

impl ExecutionMode {
    fn from_env_str(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "production" | "live" => ExecutionMode::Production,
            _ => ExecutionMode::Simulation,
        }
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // ========== Network Settings ==========
    /// JSON-RPC endpoint used for quotes, probes and submission
    pub rpc_url: String,

    // ========== Indexing Service ==========
    /// The Graph API key
    pub graph_api_key: Option<String>,

    /// The Graph gateway base URL
    pub graph_gateway_url: String,

    /// Subgraph ID of the exchange's pool index
    pub subgraph_id: String,

    /// Full endpoint override (skips gateway/key/id composition)
    pub graph_endpoint: Option<String>,

    /// Pools per subgraph page
    pub page_size: usize,

    /// Number of pages fetched per refresh
    pub page_count: usize,

    /// Full refresh attempts before giving up
    pub fetch_attempts: u32,

    // ========== Pool Filter ==========
    /// Minimum combined USD value of both pool balances
    pub min_pool_liquidity_usd: f64,

    /// Probe every pool with a single-hop quote before admitting it
    pub probe_pools: bool,

    /// Pools validated concurrently during a refresh
    pub validation_concurrency: usize,

    // ========== Path Finding ==========
    /// Token every cycle starts and ends with
    pub start_token: String,

    /// Decimals of the start token (used when it is missing from the graph)
    pub start_token_decimals: u8,

    /// Maximum hops in a cycle
    pub max_hops: usize,

    // ========== Scanning ==========
    /// Number of parallel scan workers
    pub worker_count: usize,

    /// Input amount in whole start-token units
    pub amount_in: f64,

    /// Required return above the input (0.005 = 0.5%)
    pub threshold: f64,

    /// Flat slippage margin taken off every quote (0.01 = 1%)
    pub slippage: f64,

    /// Per-hop decay applied to quotes
    pub decay_factor: f64,

    /// Log a progress line every N paths within a pass
    pub progress_interval: usize,

    /// Location of the enumerated path cache
    pub path_cache_file: String,

    // ========== Contracts ==========
    /// Uniswap V3 Quoter (quoteExactInput)
    pub quoter_address: String,

    /// Uniswap SwapRouter02 (exactInput)
    pub swap_router_address: String,

    // ========== Execution ==========
    /// Current execution mode
    pub execution_mode: ExecutionMode,

    /// Wallet key used in production mode (KEEP SECRET!)
    #[serde(skip_serializing)]
    pub private_key: Option<String>,

    /// Max fee per gas in wei
    pub max_fee_per_gas: u64,

    /// Max priority fee per gas in wei
    pub max_priority_fee_per_gas: u64,

    /// Gas limit for the swap transaction
    pub gas_limit: u64,

    /// Append detected opportunities to a JSON-lines log
    pub opportunity_log: bool,

    /// Path of the opportunity log
    pub opportunity_log_path: String,
}

/// Read an env var, falling back to `default` when unset or unparsable
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            rpc_url: env::var("RPC_URL").unwrap_or(defaults.rpc_url),

            graph_api_key: env::var("GRAPH_API_KEY").ok().filter(|k| !k.is_empty()),
            graph_gateway_url: env::var("GRAPH_GATEWAY_URL")
                .unwrap_or(defaults.graph_gateway_url),
            subgraph_id: env::var("SUBGRAPH_ID").unwrap_or(defaults.subgraph_id),
            graph_endpoint: env::var("GRAPH_ENDPOINT").ok().filter(|e| !e.is_empty()),
            page_size: env_or("PAGE_SIZE", defaults.page_size),
            page_count: env_or("PAGE_COUNT", defaults.page_count),
            fetch_attempts: env_or("FETCH_ATTEMPTS", defaults.fetch_attempts),

            min_pool_liquidity_usd: env_or(
                "MIN_POOL_LIQUIDITY_USD",
                defaults.min_pool_liquidity_usd,
            ),
            probe_pools: env_or("PROBE_POOLS", defaults.probe_pools),
            validation_concurrency: env_or(
                "VALIDATION_CONCURRENCY",
                defaults.validation_concurrency,
            ),

            start_token: env::var("START_TOKEN").unwrap_or(defaults.start_token),
            start_token_decimals: env_or("START_TOKEN_DECIMALS", defaults.start_token_decimals),
            max_hops: env_or("HOP_COUNT", defaults.max_hops),

            worker_count: env_or("WORKER_COUNT", defaults.worker_count),
            amount_in: env_or("AMOUNT_IN", defaults.amount_in),
            threshold: env_or("THRESHOLD", defaults.threshold),
            slippage: env_or("SLIPPAGE", defaults.slippage),
            decay_factor: env_or("DECAY_FACTOR", defaults.decay_factor),
            progress_interval: env_or("PROGRESS_INTERVAL", defaults.progress_interval),
            path_cache_file: env::var("PATH_CACHE_FILE").unwrap_or(defaults.path_cache_file),

            quoter_address: env::var("QUOTER_ADDRESS").unwrap_or(defaults.quoter_address),
            swap_router_address: env::var("SWAP_ROUTER_ADDRESS")
                .unwrap_or(defaults.swap_router_address),

            execution_mode: env::var("EXECUTION_MODE")
                .map(|m| ExecutionMode::from_env_str(&m))
                .unwrap_or(defaults.execution_mode),
            private_key: env::var("PRIVATE_KEY").ok().filter(|k| !k.is_empty()),
            max_fee_per_gas: env_or("MAX_FEE_PER_GAS", defaults.max_fee_per_gas),
            max_priority_fee_per_gas: env_or(
                "MAX_PRIORITY_FEE_PER_GAS",
                defaults.max_priority_fee_per_gas,
            ),
            gas_limit: env_or("GAS_LIMIT", defaults.gas_limit),
            opportunity_log: env_or("OPPORTUNITY_LOG", defaults.opportunity_log),
            opportunity_log_path: env::var("OPPORTUNITY_LOG_PATH")
                .unwrap_or(defaults.opportunity_log_path),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        // Secrets never live in the file
        if config.private_key.is_none() {
            config.private_key = env::var("PRIVATE_KEY").ok().filter(|k| !k.is_empty());
        }
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Subgraph URL the cartographer queries
    pub fn subgraph_endpoint(&self) -> Option<String> {
        if let Some(endpoint) = &self.graph_endpoint {
            return Some(endpoint.clone());
        }
        self.graph_api_key.as_ref().map(|key| {
            format!(
                "{}/{}/subgraphs/id/{}",
                self.graph_gateway_url.trim_end_matches('/'),
                key,
                self.subgraph_id
            )
        })
    }

    pub fn start_token_address(&self) -> Result<Address> {
        parse_address("START_TOKEN", &self.start_token)
    }

    pub fn quoter(&self) -> Result<Address> {
        parse_address("QUOTER_ADDRESS", &self.quoter_address)
    }

    pub fn swap_router(&self) -> Result<Address> {
        parse_address("SWAP_ROUTER_ADDRESS", &self.swap_router_address)
    }

    /// Validate configuration before a run
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() || self.rpc_url.contains("YOUR_API_KEY") {
            return Err(eyre!("Invalid RPC_URL - please set a valid endpoint"));
        }

        self.start_token_address()?;
        self.quoter()?;
        self.swap_router()?;

        if self.subgraph_endpoint().is_none() {
            return Err(eyre!(
                "No subgraph endpoint - set GRAPH_API_KEY or GRAPH_ENDPOINT"
            ));
        }
        if self.page_size == 0 {
            return Err(eyre!("PAGE_SIZE must be at least 1"));
        }
        if self.fetch_attempts == 0 {
            return Err(eyre!("FETCH_ATTEMPTS must be at least 1"));
        }
        if self.max_hops == 0 || self.max_hops > 6 {
            return Err(eyre!(
                "HOP_COUNT must be between 1 and 6 (currently {})",
                self.max_hops
            ));
        }
        if self.worker_count == 0 {
            return Err(eyre!("WORKER_COUNT must be at least 1"));
        }
        if self.amount_in <= 0.0 || !self.amount_in.is_finite() {
            return Err(eyre!("AMOUNT_IN must be positive (currently {})", self.amount_in));
        }
        if !(self.decay_factor > 0.0 && self.decay_factor <= 1.0) {
            return Err(eyre!(
                "DECAY_FACTOR must be in (0, 1] (currently {})",
                self.decay_factor
            ));
        }
        if !(0.0..1.0).contains(&self.slippage) {
            return Err(eyre!(
                "SLIPPAGE must be in [0, 1) (currently {})",
                self.slippage
            ));
        }
        if self.execution_mode == ExecutionMode::Production && self.private_key.is_none() {
            return Err(eyre!("Production mode requires PRIVATE_KEY"));
        }

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║                 ARBSCAN - CONFIGURATION                    ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Execution Mode:    {:^40} ║", self.execution_mode);
        println!("║ Start Token:       {:^40} ║", abbreviate(&self.start_token));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ POOL DISCOVERY                                             ║");
        println!("║ • Pages:           {:>40} ║", format!("{} x {}", self.page_count, self.page_size));
        println!("║ • Min Liquidity:   ${:<39.0} ║", self.min_pool_liquidity_usd);
        println!("║ • Probe Pools:     {:^40} ║", if self.probe_pools { "✓ Enabled" } else { "✗ Disabled" });
        println!("║ • Fetch Attempts:  {:^40} ║", self.fetch_attempts);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ SCANNING                                                   ║");
        println!("║ • Max Hops:        {:^40} ║", self.max_hops);
        println!("║ • Workers:         {:^40} ║", self.worker_count);
        println!("║ • Amount In:       {:<40} ║", self.amount_in);
        println!("║ • Threshold:       {:>39.2}% ║", self.threshold * 100.0);
        println!("║ • Slippage:        {:>39.2}% ║", self.slippage * 100.0);
        println!("║ • Decay / Hop:     {:<40} ║", self.decay_factor);
        println!("║ • Path Cache:      {:^40} ║", abbreviate(&self.path_cache_file));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ EXECUTION                                                  ║");
        println!("║ • Wallet Key:      {:^40} ║",
            if self.private_key.is_some() { "✓ Configured" } else { "✗ Not Set" }
        );
        println!("║ • Gas Limit:       {:^40} ║", self.gas_limit);
        println!("║ • Opportunity Log: {:^40} ║",
            if self.opportunity_log { "✓ Enabled" } else { "✗ Disabled" }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

fn parse_address(name: &str, value: &str) -> Result<Address> {
    Address::from_str(value.trim()).map_err(|e| eyre!("Invalid {} '{}': {}", name, value, e))
}

fn abbreviate(value: &str) -> String {
    if value.chars().count() > 40 {
        let head: String = value.chars().take(24).collect();
        let tail: String = value.chars().rev().take(13).collect::<Vec<_>>().into_iter().rev().collect();
        format!("{}...{}", head, tail)
    } else {
        value.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "https://arb1.arbitrum.io/rpc".to_string(),
            graph_api_key: None,
            graph_gateway_url: "https://gateway-arbitrum.network.thegraph.com/api".to_string(),
            subgraph_id: "FQ6JYszEKApsBpAmiHesRsd9Ygc6mzmpNRANeVQFYoVX".to_string(),
            graph_endpoint: None,
            page_size: 100,
            page_count: 5,
            fetch_attempts: 3,
            min_pool_liquidity_usd: 1000.0,
            probe_pools: true,
            validation_concurrency: 8,
            start_token: "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1".to_string(), // WETH (Arbitrum)
            start_token_decimals: 18,
            max_hops: 3,
            worker_count: 4,
            amount_in: 0.1,
            threshold: 0.005,
            slippage: 0.01,
            decay_factor: 0.9975,
            progress_interval: 500,
            path_cache_file: "./cache/uniswap_paths.txt".to_string(),
            quoter_address: "0xb27308f9F90D607463bb33eA1BeBb41C27CE5AB6".to_string(),
            swap_router_address: "0x68b3465833fb72A70ecDF485E0e4C7bD8665Fc45".to_string(),
            execution_mode: ExecutionMode::Simulation,
            private_key: None,
            max_fee_per_gas: 10_000_000,
            max_priority_fee_per_gas: 0,
            gas_limit: 1_000_000,
            opportunity_log: true,
            opportunity_log_path: "./logs/opportunities.log".to_string(),
        }
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            graph_api_key: Some("test-key".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.execution_mode, ExecutionMode::Simulation);
        assert_eq!(config.fetch_attempts, 3);
        assert_eq!(config.min_pool_liquidity_usd, 1000.0);
        assert_eq!(config.decay_factor, 0.9975);
    }

    #[test]
    fn test_default_addresses_parse() {
        let config = Config::default();
        assert!(config.start_token_address().is_ok());
        assert!(config.quoter().is_ok());
        assert!(config.swap_router().is_ok());
    }

    #[test]
    fn test_subgraph_endpoint_composition() {
        let config = valid_config();
        assert_eq!(
            config.subgraph_endpoint().unwrap(),
            "https://gateway-arbitrum.network.thegraph.com/api/test-key/subgraphs/id/FQ6JYszEKApsBpAmiHesRsd9Ygc6mzmpNRANeVQFYoVX"
        );

        let overridden = Config {
            graph_endpoint: Some("http://localhost:8000/subgraphs/name/uni".to_string()),
            ..Config::default()
        };
        assert_eq!(
            overridden.subgraph_endpoint().unwrap(),
            "http://localhost:8000/subgraphs/name/uni"
        );

        assert!(Config::default().subgraph_endpoint().is_none());
    }

    #[test]
    fn test_validation() {
        assert!(valid_config().validate().is_ok());

        // No API key and no endpoint
        assert!(Config::default().validate().is_err());

        let bad_hops = Config { max_hops: 0, ..valid_config() };
        assert!(bad_hops.validate().is_err());

        let no_workers = Config { worker_count: 0, ..valid_config() };
        assert!(no_workers.validate().is_err());

        let bad_slippage = Config { slippage: 1.0, ..valid_config() };
        assert!(bad_slippage.validate().is_err());

        let bad_token = Config { start_token: "0x1234".to_string(), ..valid_config() };
        assert!(bad_token.validate().is_err());

        let production = Config { execution_mode: ExecutionMode::Production, ..valid_config() };
        assert!(production.validate().is_err());
    }

    #[test]
    fn test_execution_mode_parsing() {
        assert_eq!(ExecutionMode::from_env_str("PRODUCTION"), ExecutionMode::Production);
        assert_eq!(ExecutionMode::from_env_str("simulation"), ExecutionMode::Simulation);
        assert_eq!(ExecutionMode::from_env_str("anything"), ExecutionMode::Simulation);
    }

    #[test]
    fn test_toml_round_trip_skips_private_key() {
        let config = Config {
            private_key: Some("0xdeadbeef".to_string()),
            ..valid_config()
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arbscan.toml");

        config.save_to_file(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("deadbeef"));

        let loaded: Config = toml::from_str(&written).unwrap();
        assert_eq!(loaded.max_hops, config.max_hops);
        assert_eq!(loaded.start_token, config.start_token);
    }
}
