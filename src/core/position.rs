//! Per-user position state within one market.

use serde::{Deserialize, Serialize};

/// A user's standing in one market: collateral held and borrow debt in
/// shares. Created on first collateral deposit or borrow; never deleted,
/// only zeroed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Collateral in native token units, including any auction-locked part
    pub collateral: u128,
    /// Portion of `collateral` reserved for an in-flight liquidation auction
    pub locked_collateral: u128,
    /// WAD-scaled borrow shares
    pub borrow_shares: u128,
}

impl Position {
    /// Collateral not reserved by a liquidation auction
    pub fn free_collateral(&self) -> u128 {
        self.collateral.saturating_sub(self.locked_collateral)
    }

    /// Whether the position carries any debt
    pub fn has_debt(&self) -> bool {
        self.borrow_shares > 0
    }

    /// Whether the position is fully zeroed
    pub fn is_empty(&self) -> bool {
        self.collateral == 0 && self.borrow_shares == 0
    }
}
