//! Contract bindings used for health factor queries.

use alloy::primitives::{address, Address, U256};
use alloy::sol;

/// Canonical Multicall3 deployment (same address on every supported chain).
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// 1e18, the fixed-point scale of pool health factors.
const WAD: u128 = 1_000_000_000_000_000_000;

sol! {
    /// Lending pool account data (same ABI on V2 and V3; V2 names the base currency ETH).
    #[sol(rpc)]
    interface IPool {
        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );
    }

    /// Multicall3 aggregate interface
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Call3Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Call3Result[] memory returnData);
    }
}

/// Convert a WAD-scaled health factor to `f64`.
///
/// Accounts without debt report `uint256.max`; anything beyond `u128` is
/// treated as unbounded.
pub fn health_factor_from_wad(raw: U256) -> f64 {
    if raw > U256::from(u128::MAX) {
        return f64::INFINITY;
    }
    let raw = raw.to::<u128>();
    let whole = raw / WAD;
    let frac = raw % WAD;
    whole as f64 + frac as f64 / WAD as f64
}
