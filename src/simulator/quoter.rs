//! UniswapV3 Path Quoter - Provider-based Simulation
//!
//! Quotes a whole packed multi-hop path in one `eth_call` against the
//! Uniswap V3 Quoter's `quoteExactInput`.

use alloy_primitives::{Address, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use eyre::Result;
use thiserror::Error;

use crate::brain::ArbPath;

// ============================================
// SOLIDITY INTERFACES
// ============================================

sol! {
    /// Uniswap V3 Quoter (V1) interface
    #[derive(Debug)]
    interface IQuoter {
        function quoteExactInput(bytes path, uint256 amountIn) external returns (uint256 amountOut);
    }
}

/// Why a quote could not be produced
#[derive(Error, Debug)]
pub enum QuoteError {
    /// The quoter ran and reverted (no liquidity, bad pool, price limit)
    #[error("quote reverted: {0}")]
    Reverted(String),

    /// The node could not be reached or did not answer properly
    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode quote: {0}")]
    Decode(String),
}

impl QuoteError {
    /// Short label for log lines
    pub fn class(&self) -> &'static str {
        match self {
            QuoteError::Reverted(_) => "revert",
            QuoteError::Transport(_) => "transport",
            QuoteError::Decode(_) => "decode",
        }
    }
}

/// Anything that can price a full cyclic path
#[async_trait]
pub trait PathQuoter: Send + Sync {
    async fn quote(&self, path: &ArbPath, amount_in: U256) -> Result<U256, QuoteError>;
}

/// Quoter backed by the on-chain Quoter contract
pub struct UniV3PathQuoter {
    provider: RootProvider,
    quoter: Address,
}

impl UniV3PathQuoter {
    pub fn new(rpc_url: &str, quoter: Address) -> Result<Self> {
        let provider = RootProvider::new_http(rpc_url.parse()?);
        Ok(Self { provider, quoter })
    }

    pub fn calldata(path: &ArbPath, amount_in: U256) -> Vec<u8> {
        IQuoter::quoteExactInputCall {
            path: path.encode_packed(),
            amountIn: amount_in,
        }
        .abi_encode()
    }
}

#[async_trait]
impl PathQuoter for UniV3PathQuoter {
    async fn quote(&self, path: &ArbPath, amount_in: U256) -> Result<U256, QuoteError> {
        let tx = TransactionRequest::default()
            .to(self.quoter)
            .input(Self::calldata(path, amount_in).into());

        let output = self.provider.call(tx).await.map_err(|e| match e.as_error_resp() {
            // The node executed the call and returned an error payload
            Some(payload) => QuoteError::Reverted(payload.message.to_string()),
            None => QuoteError::Transport(e.to_string()),
        })?;

        IQuoter::quoteExactInputCall::abi_decode_returns(&output)
            .map_err(|e| QuoteError::Decode(e.to_string()))
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_calldata_layout() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let path = ArbPath::new(a).extended(500, b).extended(3000, a);
        let amount = U256::from(10u64).pow(U256::from(17u64));

        let calldata = UniV3PathQuoter::calldata(&path, amount);
        let decoded = IQuoter::quoteExactInputCall::abi_decode(&calldata).unwrap();

        assert_eq!(decoded.path, path.encode_packed());
        assert_eq!(decoded.amountIn, amount);
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(QuoteError::Reverted("x".into()).class(), "revert");
        assert_eq!(QuoteError::Transport("x".into()).class(), "transport");
        assert!(QuoteError::Decode("bad".into()).to_string().contains("bad"));
    }
}
