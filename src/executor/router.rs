//! SwapRouter02 call encoding
//!
//! A cycle is executed as a single `exactInput` swap along the same packed
//! path the quoter priced.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};

use crate::brain::ArbPath;

sol! {
    /// Uniswap SwapRouter02 (no deadline in the params struct)
    #[derive(Debug)]
    interface ISwapRouter02 {
        struct ExactInputParams {
            bytes path;
            address recipient;
            uint256 amountIn;
            uint256 amountOutMinimum;
        }

        function exactInput(ExactInputParams calldata params) external payable returns (uint256 amountOut);
    }
}

/// Calldata for `exactInput` along `path`
pub fn exact_input_calldata(
    path: &ArbPath,
    recipient: Address,
    amount_in: U256,
    amount_out_minimum: U256,
) -> Vec<u8> {
    ISwapRouter02::exactInputCall {
        params: ISwapRouter02::ExactInputParams {
            path: path.encode_packed(),
            recipient,
            amountIn: amount_in,
            amountOutMinimum: amount_out_minimum,
        },
    }
    .abi_encode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_input_calldata() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let recipient = Address::repeat_byte(0xee);
        let path = ArbPath::new(a).extended(500, b).extended(3000, a);

        let calldata = exact_input_calldata(&path, recipient, U256::from(100u64), U256::from(105u64));
        assert_eq!(&calldata[..4], ISwapRouter02::exactInputCall::SELECTOR.as_slice());

        let decoded = ISwapRouter02::exactInputCall::abi_decode(&calldata).unwrap();
        assert_eq!(decoded.params.path, path.encode_packed());
        assert_eq!(decoded.params.recipient, recipient);
        assert_eq!(decoded.params.amountIn, U256::from(100u64));
        assert_eq!(decoded.params.amountOutMinimum, U256::from(105u64));
    }
}
