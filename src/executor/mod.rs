//! Phase 4: The Executor
//!
//! Consumes profitable routes coming off the scan workers:
//! - Simulation: log the route and append it to the opportunity log
//! - Production: sign and submit an `exactInput` swap through SwapRouter02
//!
//! ⚠️  WARNING: Production mode interacts with real funds!

mod router;

pub use router::exact_input_calldata;

use alloy_network::{EthereumWallet, ReceiptResponse};
use alloy_primitives::Address;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use chrono::{DateTime, Utc};
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ExecutionMode};
use crate::simulator::ProfitableRoute;

/// Submits (or records) profitable routes
pub struct SwapExecutor {
    mode: ExecutionMode,
    rpc_url: String,
    router: Address,
    signer: Option<PrivateKeySigner>,
    max_fee_per_gas: u128,
    max_priority_fee_per_gas: u128,
    gas_limit: u64,
    opportunity_log: Option<PathBuf>,
}

impl SwapExecutor {
    pub fn new(config: &Config) -> Result<Self> {
        let signer = config
            .private_key
            .as_deref()
            .map(|key| {
                PrivateKeySigner::from_str(key.trim().trim_start_matches("0x"))
                    .map_err(|e| eyre!("Failed to parse PRIVATE_KEY: {}", e))
            })
            .transpose()?;

        if let Some(signer) = &signer {
            info!("✓ Wallet loaded: {:?}", signer.address());
        }

        if config.execution_mode == ExecutionMode::Production && signer.is_none() {
            return Err(eyre!("Production mode requires PRIVATE_KEY"));
        }

        Ok(Self {
            mode: config.execution_mode,
            rpc_url: config.rpc_url.clone(),
            router: config.swap_router()?,
            signer,
            max_fee_per_gas: config.max_fee_per_gas as u128,
            max_priority_fee_per_gas: config.max_priority_fee_per_gas as u128,
            gas_limit: config.gas_limit,
            opportunity_log: config
                .opportunity_log
                .then(|| PathBuf::from(&config.opportunity_log_path)),
        })
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Act on one profitable route
    pub async fn execute(&self, route: &ProfitableRoute) -> Result<ExecutionResult> {
        match self.mode {
            ExecutionMode::Simulation => {
                info!("📋 SIMULATION MODE: Would execute route");
                info!("   Path: {}", route.readable.join(" → "));
                info!("   Packed: {}", route.path.to_hex());
                info!(
                    "   Input: {} | Adjusted output: {:.6} ({:+.3}%)",
                    route.amount_in,
                    route.adjusted_output,
                    route.profit_pct()
                );

                let logged = match &self.opportunity_log {
                    Some(path) => {
                        OpportunityLog::from_route(route, self.mode).append_to_file(path)?;
                        debug!("Logged opportunity to {}", path.display());
                        true
                    }
                    None => false,
                };

                Ok(ExecutionResult::Simulated { logged })
            }

            ExecutionMode::Production => {
                info!("🚀 PRODUCTION MODE: Submitting swap!");
                warn!("⚠️  This will use real funds!");

                if let Some(path) = &self.opportunity_log {
                    if let Err(e) = OpportunityLog::from_route(route, self.mode).append_to_file(path) {
                        warn!("Failed to log opportunity: {}", e);
                    }
                }

                self.submit(route).await
            }
        }
    }

    async fn submit(&self, route: &ProfitableRoute) -> Result<ExecutionResult> {
        let signer = self
            .signer
            .clone()
            .ok_or_else(|| eyre!("No signer configured"))?;
        let recipient = signer.address();

        let tx = self.build_swap_tx(route, recipient)?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(self.rpc_url.parse()?);

        let pending = provider.send_transaction(tx).await?;
        let tx_hash = *pending.tx_hash();
        info!("   Sent: {:?}", tx_hash);

        let receipt = pending.get_receipt().await?;
        let success = receipt.status();
        if success {
            info!("✅ Swap confirmed in block {:?}", receipt.block_number());
        } else {
            warn!("❌ Swap reverted: {:?}", tx_hash);
        }

        Ok(ExecutionResult::Submitted {
            tx_hash: format!("{:?}", tx_hash),
            success,
        })
    }

    /// Swap transaction for `route`; the start asset is sent as value
    pub fn build_swap_tx(&self, route: &ProfitableRoute, recipient: Address) -> Result<TransactionRequest> {
        let min_out = route.min_output_raw()?;
        let calldata = exact_input_calldata(&route.path, recipient, route.amount_in_raw, min_out);

        Ok(TransactionRequest::default()
            .from(recipient)
            .to(self.router)
            .input(calldata.into())
            .value(route.amount_in_raw)
            .gas_limit(self.gas_limit)
            .max_fee_per_gas(self.max_fee_per_gas)
            .max_priority_fee_per_gas(self.max_priority_fee_per_gas))
    }
}

/// Consume routes from the scan workers, one execution task per route
pub fn spawn_dispatcher(
    executor: Arc<SwapExecutor>,
    mut routes: UnboundedReceiver<ProfitableRoute>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(route) = routes.recv().await {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                match executor.execute(&route).await {
                    Ok(result) if result.is_success() => {
                        debug!("Route from worker {}: {:?}", route.worker_id, result)
                    }
                    Ok(result) => warn!("Route from worker {} did not land: {:?}", route.worker_id, result),
                    Err(e) => error!(
                        "Execution failed for {}: {}",
                        route.readable.join(" → "),
                        e
                    ),
                }
            });
        }
        debug!("Route channel closed, dispatcher exiting");
    })
}

/// Result of an execution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Simulation mode; `logged` if it reached the opportunity log
    Simulated { logged: bool },

    /// Transaction mined (production mode)
    Submitted { tx_hash: String, success: bool },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExecutionResult::Simulated { .. } | ExecutionResult::Submitted { success: true, .. }
        )
    }
}

// ============================================
// OPPORTUNITY LOG
// ============================================

/// One JSON line per detected route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityLog {
    pub timestamp: DateTime<Utc>,
    pub mode: String,
    pub worker_id: usize,
    pub path: Vec<String>,
    pub raw_path: Vec<String>,
    pub amount_in: f64,
    pub adjusted_output: f64,
    pub profit_pct: f64,
    pub raw_output: String,
}

impl OpportunityLog {
    pub fn from_route(route: &ProfitableRoute, mode: ExecutionMode) -> Self {
        Self {
            timestamp: route.detected_at,
            mode: mode.to_string(),
            worker_id: route.worker_id,
            path: route.readable.clone(),
            raw_path: route.path.to_raw_elements(),
            amount_in: route.amount_in,
            adjusted_output: route.adjusted_output,
            profit_pct: route.profit_pct(),
            raw_output: route.raw_output.to_string(),
        }
    }

    /// Append this log to a file
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let json = serde_json::to_string(self)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

// ============================================
// TESTS
// ============================================
