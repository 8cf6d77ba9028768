//! Liquidity Filter - Pool Admission
//!
//! A pool only becomes a graph edge if both of its balances, priced in USD,
//! add up to the configured minimum. Optionally every pool is probed with a
//! one-unit single-hop quote first, so pools that revert never reach the
//! enumerator.

use alloy_primitives::{utils::format_units, Address, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use eyre::{eyre, Result};
use tracing::debug;

use super::subgraph::{PoolRecord, TokenRecord};
use crate::brain::ArbPath;
use crate::simulator::{PathQuoter, UniV3PathQuoter};

sol! {
    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
}

/// Combined USD value of both pool balances
pub fn pool_liquidity_usd(
    balance0: U256,
    decimals0: u8,
    price0: f64,
    balance1: U256,
    decimals1: u8,
    price1: f64,
) -> f64 {
    to_units(balance0, decimals0) * price0 + to_units(balance1, decimals1) * price1
}

pub fn meets_min_liquidity(value_usd: f64, min_usd: f64) -> bool {
    value_usd >= min_usd
}

fn to_units(amount: U256, decimals: u8) -> f64 {
    format_units(amount, decimals)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Decides whether a fetched pool becomes a graph edge
#[async_trait]
pub trait PoolValidator: Send + Sync {
    async fn admit(&self, pool: &PoolRecord) -> bool;
}

/// Validator backed by live chain state
pub struct OnChainValidator {
    provider: RootProvider,
    quoter: UniV3PathQuoter,
    min_liquidity_usd: f64,
    probe: bool,
}

impl OnChainValidator {
    pub fn new(rpc_url: &str, quoter: Address, min_liquidity_usd: f64, probe: bool) -> Result<Self> {
        let provider = RootProvider::new_http(rpc_url.parse()?);
        Ok(Self {
            provider,
            quoter: UniV3PathQuoter::new(rpc_url, quoter)?,
            min_liquidity_usd,
            probe,
        })
    }

    async fn call_contract(&self, to: Address, calldata: Vec<u8>) -> Result<Vec<u8>> {
        let tx = TransactionRequest::default().to(to).input(calldata.into());

        let result = self
            .provider
            .call(tx)
            .await
            .map_err(|e| eyre!("eth_call failed: {}", e))?;

        Ok(result.to_vec())
    }

    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256> {
        let calldata = IERC20::balanceOfCall { account: holder }.abi_encode();
        let output = self.call_contract(token, calldata).await?;

        IERC20::balanceOfCall::abi_decode_returns(&output)
            .map_err(|e| eyre!("Failed to decode balanceOf: {}", e))
    }

    /// Quote one whole unit of token0 through this pool alone
    async fn probe_pool(&self, pool: &PoolRecord) -> Result<U256> {
        let path = ArbPath::new(pool.token0.address).extended(pool.fee, pool.token1.address);
        let amount_in = U256::from(10u64).pow(U256::from(pool.token0.decimals));

        Ok(self.quoter.quote(&path, amount_in).await?)
    }

    async fn liquidity_usd(&self, pool: &PoolRecord) -> Result<f64> {
        let price = |token: &TokenRecord| {
            token
                .price_usd
                .ok_or_else(|| eyre!("no USD price for {}", token.symbol))
        };
        let price0 = price(&pool.token0)?;
        let price1 = price(&pool.token1)?;

        let balance0 = self.balance_of(pool.token0.address, pool.address).await?;
        let balance1 = self.balance_of(pool.token1.address, pool.address).await?;

        Ok(pool_liquidity_usd(
            balance0,
            pool.token0.decimals,
            price0,
            balance1,
            pool.token1.decimals,
            price1,
        ))
    }
}

#[async_trait]
impl PoolValidator for OnChainValidator {
    async fn admit(&self, pool: &PoolRecord) -> bool {
        if pool.token0.address == pool.token1.address {
            return false;
        }

        if self.probe {
            if let Err(e) = self.probe_pool(pool).await {
                debug!("Pool {:?} failed probe quote: {}", pool.address, e);
                return false;
            }
        }

        match self.liquidity_usd(pool).await {
            Ok(value) if meets_min_liquidity(value, self.min_liquidity_usd) => true,
            Ok(value) => {
                debug!(
                    "Pool {:?} ({}/{}) below liquidity floor: ${:.2}",
                    pool.address, pool.token0.symbol, pool.token1.symbol, value
                );
                false
            }
            Err(e) => {
                debug!("Pool {:?} excluded: {}", pool.address, e);
                false
            }
        }
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_liquidity_usd() {
        // 1.5 WETH @ 2000 + 500 USDC @ 1
        let weth = U256::from(1_500_000_000_000_000_000u128);
        let usdc = U256::from(500_000_000u64);
        let value = pool_liquidity_usd(weth, 18, 2000.0, usdc, 6, 1.0);
        assert!((value - 3500.0).abs() < 1e-6);
    }

    #[test]
    fn test_liquidity_threshold_is_inclusive() {
        assert!(meets_min_liquidity(1000.0, 1000.0));
        assert!(meets_min_liquidity(1000.01, 1000.0));
        assert!(!meets_min_liquidity(999.99, 1000.0));
    }

    #[test]
    fn test_empty_pool_has_no_value() {
        let value = pool_liquidity_usd(U256::ZERO, 18, 3000.0, U256::ZERO, 6, 1.0);
        assert_eq!(value, 0.0);
        assert!(!meets_min_liquidity(value, 1000.0));
    }

    #[test]
    fn test_balance_of_calldata() {
        let holder = Address::repeat_byte(0x11);
        let calldata = IERC20::balanceOfCall { account: holder }.abi_encode();
        // balanceOf(address) selector
        assert_eq!(&calldata[..4], &[0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(calldata.len(), 36);
    }
}
