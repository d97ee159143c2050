//! Token contract interface.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    /// The single method the store uses on its token.
    #[derive(Debug)]
    interface IToken {
        function transfer(address _to, uint256 _value) external returns (bool);
    }
}

/// ABI-encoded calldata for `transfer(to, value)`.
pub fn transfer_calldata(to: Address, value: U256) -> Bytes {
    IToken::transferCall { _to: to, _value: value }.abi_encode().into()
}
