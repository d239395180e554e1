// abi.rs
// Solidity interfaces of the token, router and staking contracts.

use crate::error::WalletError;
use alloy_sol_types::{sol, SolCall};

sol! {
    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256 balance);
        function decimals() external view returns (uint8 decimals);
        function allowance(address owner, address spender) external view returns (uint256 remaining);
        function approve(address spender, uint256 amount) external returns (bool approved);
    }

    interface IStakeRouter {
        function hardstake(address token, uint256 amount) external;
        function unstake(address token, uint256 amount) external;
    }

    interface IStaking {
        function stakes(address user, address token) external view returns (uint256 amount, uint256 rewardDebt);
        function pendingRewards(address user, address token) external view returns (uint256 pending);
        function claim(address token) external;
        function totalStaked(address token) external view returns (uint256 total);
    }
}

/// Decodes `eth_call` output for `C`. Empty output usually means the address holds no contract.
pub fn decode_returns<C: SolCall>(out: &[u8]) -> Result<C::Return, WalletError> {
    C::abi_decode_returns(out, true).map_err(|e| {
        WalletError::ContractCallReverted(format!(
            "{}: unexpected return data ({} bytes): {}",
            C::SIGNATURE,
            out.len(),
            e
        ))
    })
}
