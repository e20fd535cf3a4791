//! Dutch auction record and price interpolation.

use serde::{Deserialize, Serialize};

use crate::core::ids::{AccountId, AuctionId, MarketId};
use crate::error::Result;
use crate::utils::math::{mul_div, Rounding};

/// Lifecycle of an auction: `Active -> {Completed, Cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionStatus {
    /// Accepting fills until the deadline
    Active,
    /// Fully filled on the debt or collateral side
    Completed,
    /// Expired unfilled and cancelled
    Cancelled,
}

/// One Dutch auction over a liquidatable position.
///
/// `debt_to_repay` and `collateral_for_sale` both decrease monotonically as
/// fills land. The price falls linearly from `start_price` (a premium over
/// the oracle reference, unprofitable at t=0 to deter instant sniping) to
/// `end_price` (the discounted floor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    /// Auction identifier
    pub id: AuctionId,
    /// Market the position lives in
    pub market: MarketId,
    /// Borrower under liquidation
    pub user: AccountId,
    /// Remaining debt a filler can repay, borrow-token units
    pub debt_to_repay: u128,
    /// Remaining collateral on offer, collateral-token units
    pub collateral_for_sale: u128,
    /// Auction opening time
    pub start_time: u64,
    /// Hard deadline; fills past this fail
    pub end_time: u64,
    /// WAD price (borrow per collateral) at `start_time`
    pub start_price: u128,
    /// WAD price floor at `end_time`
    pub end_price: u128,
    /// Current lifecycle state
    pub status: AuctionStatus,
}

impl Auction {
    /// Whether the auction still accepts fills (ignoring the deadline)
    pub fn is_active(&self) -> bool {
        self.status == AuctionStatus::Active
    }

    /// Whether the deadline has passed
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.end_time
    }

    /// Linearly interpolated price at `now`, clamped to `end_price` past the
    /// deadline.
    ///
    /// The decrement rounds down, so the quoted price rounds up toward the
    /// protocol and is monotonically non-increasing in time.
    pub fn current_price(&self, now: u64) -> Result<u128> {
        let duration = self.end_time - self.start_time;
        let elapsed = now.saturating_sub(self.start_time).min(duration);
        let span = self.start_price - self.end_price;
        let decrement = mul_div(span, elapsed as u128, duration as u128, Rounding::Down)?;
        Ok(self.start_price - decrement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::WAD;

    fn auction() -> Auction {
        Auction {
            id: AuctionId::new(1),
            market: MarketId::new(1),
            user: AccountId::from_low_u64(2),
            debt_to_repay: 7_500_000_000,
            collateral_for_sale: 437_500_000,
            start_time: 1_000,
            end_time: 2_200,
            start_price: 1_890 * WAD,
            end_price: 1_710 * WAD,
            status: AuctionStatus::Active,
        }
    }

    #[test]
    fn test_price_endpoints() {
        let a = auction();
        assert_eq!(a.current_price(1_000).unwrap(), 1_890 * WAD);
        assert_eq!(a.current_price(2_200).unwrap(), 1_710 * WAD);
        // Clamped past the deadline
        assert_eq!(a.current_price(10_000).unwrap(), 1_710 * WAD);
        // Clamped before the start
        assert_eq!(a.current_price(0).unwrap(), 1_890 * WAD);
    }

    #[test]
    fn test_price_midpoint() {
        let a = auction();
        assert_eq!(a.current_price(1_600).unwrap(), 1_800 * WAD);
    }

    #[test]
    fn test_price_monotone_non_increasing() {
        let a = auction();
        let mut last = u128::MAX;
        for t in (1_000..=2_200).step_by(37) {
            let price = a.current_price(t).unwrap();
            assert!(price <= last);
            last = price;
        }
    }

    #[test]
    fn test_expiry() {
        let a = auction();
        assert!(!a.is_expired(2_200));
        assert!(a.is_expired(2_201));
    }
}
