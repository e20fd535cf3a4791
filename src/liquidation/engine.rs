//! The Dutch-auction liquidation engine.
//!
//! Consumes the pool's liquidation hooks exclusively: it locks collateral
//! when an auction opens, settles fills through `execute_liquidation`, and
//! releases unsold collateral on cancellation or early completion. Any
//! caller may fill an active auction, in parts or in full; each fill is an
//! indivisible unit.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::core::ids::{AccountId, AuctionId, MarketId};
use crate::core::pool::LedgerPool;
use crate::core::token::FungibleToken;
use crate::error::{Error, Result};
use crate::liquidation::auction::{Auction, AuctionStatus};
use crate::oracle::router::PriceOracle;
use crate::utils::constants::{
    DEFAULT_AUCTION_DURATION_SECS, DEFAULT_END_DISCOUNT, DEFAULT_START_PREMIUM, MAX_EVENT_HISTORY,
    WAD,
};
use crate::utils::math::{
    amount_from_usd, checked_add, mul_div, mul_div_wide, pow10, value_usd, w_mul_down, w_mul_up,
    zero_floor_sub, Rounding,
};
use crate::utils::validation::{validate_duration, validate_non_zero};

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Auction timing and pricing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionParams {
    /// Auction length in seconds
    pub duration_secs: u64,
    /// WAD multiplier over the oracle reference at t=0; must exceed 1
    pub start_premium: u128,
    /// WAD multiplier under the oracle reference at the deadline; must be
    /// below 1 and above 0
    pub end_discount: u128,
}

impl Default for AuctionParams {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_AUCTION_DURATION_SECS,
            start_premium: DEFAULT_START_PREMIUM,
            end_discount: DEFAULT_END_DISCOUNT,
        }
    }
}

impl AuctionParams {
    /// Validate parameter consistency
    pub fn validate(&self) -> Result<()> {
        validate_duration(self.duration_secs, "duration_secs")?;
        if self.start_premium <= WAD {
            return Err(Error::InvalidParameter {
                name: "start_premium".into(),
                reason: "must exceed 1 WAD".into(),
            });
        }
        if self.end_discount == 0 || self.end_discount >= WAD {
            return Err(Error::InvalidParameter {
                name: "end_discount".into(),
                reason: "must be between 0 and 1 WAD exclusive".into(),
            });
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENTS & STATISTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Record of one auction fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillEvent {
    /// Auction that was filled
    pub auction_id: AuctionId,
    /// Market the auction belongs to
    pub market: MarketId,
    /// Borrower under liquidation
    pub user: AccountId,
    /// Caller who filled
    pub liquidator: AccountId,
    /// Debt repaid by the fill, borrow-token units
    pub debt_repaid: u128,
    /// Collateral delivered to the filler, collateral-token units
    pub collateral_received: u128,
    /// WAD auction price the fill cleared at
    pub price: u128,
    /// Fill time
    pub timestamp: u64,
}

/// Aggregate engine statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionStats {
    /// Auctions ever started
    pub total_auctions: u64,
    /// Fills ever executed
    pub total_fills: u64,
    /// Auctions cancelled after expiry
    pub total_cancelled: u64,
    /// Debt repaid across all fills
    pub total_debt_repaid: u128,
    /// Collateral sold across all fills
    pub total_collateral_sold: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Dutch-auction liquidator over a set of authorized markets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DutchAuctionLiquidator {
    account: AccountId,
    factory: AccountId,
    params: AuctionParams,
    authorized_markets: HashSet<MarketId>,
    auctions: HashMap<AuctionId, Auction>,
    active_index: HashMap<(MarketId, AccountId), AuctionId>,
    next_auction_seq: u64,
    fills: Vec<FillEvent>,
    max_events: usize,
    stats: AuctionStats,
    #[serde(skip)]
    entered: bool,
}

impl DutchAuctionLiquidator {
    /// Create an engine acting as principal `account`, with markets enrolled
    /// by `factory`
    pub fn new(account: AccountId, factory: AccountId, params: AuctionParams) -> Result<Self> {
        if account.is_zero() || factory.is_zero() {
            return Err(Error::ZeroAddress);
        }
        params.validate()?;

        Ok(Self {
            account,
            factory,
            params,
            authorized_markets: HashSet::new(),
            auctions: HashMap::new(),
            active_index: HashMap::new(),
            next_auction_seq: 1,
            fills: Vec::new(),
            max_events: MAX_EVENT_HISTORY,
            stats: AuctionStats::default(),
            entered: false,
        })
    }

    /// The principal this engine uses against pool hooks
    pub fn account(&self) -> AccountId {
        self.account
    }

    /// Auction parameters
    pub fn params(&self) -> &AuctionParams {
        &self.params
    }

    /// Enroll a market; factory principal only
    pub fn authorize_market(&mut self, caller: AccountId, market: MarketId) -> Result<()> {
        if caller != self.factory {
            return Err(Error::OnlyFactory);
        }
        self.authorized_markets.insert(market);
        tracing::info!(%market, "market authorized for liquidation");
        Ok(())
    }

    /// Whether a market is enrolled
    pub fn is_market_authorized(&self, market: MarketId) -> bool {
        self.authorized_markets.contains(&market)
    }

    /// An auction by id
    pub fn auction(&self, id: AuctionId) -> Option<&Auction> {
        self.auctions.get(&id)
    }

    /// The active auction over `(market, user)`, if any
    pub fn active_auction_for(&self, market: MarketId, user: AccountId) -> Option<&Auction> {
        self.active_index
            .get(&(market, user))
            .and_then(|id| self.auctions.get(id))
    }

    /// Recent fills, oldest first
    pub fn recent_fills(&self) -> &[FillEvent] {
        &self.fills
    }

    /// Aggregate statistics
    pub fn statistics(&self) -> AuctionStats {
        self.stats
    }

    /// Serialize the engine to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize an engine from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // AUCTION LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Open an auction over an unhealthy position.
    ///
    /// Sizing: `debt_to_repay` is the close-factor share of the total debt,
    /// and `collateral_for_sale` covers it plus the liquidation penalty at
    /// oracle prices. When the user's collateral caps the sale, the debt is
    /// recomputed downward so the penalty ratio is preserved.
    pub fn start_auction(
        &mut self,
        pool: &mut LedgerPool,
        user: AccountId,
        oracle: &PriceOracle,
        now: u64,
    ) -> Result<AuctionId> {
        self.with_guard(|engine| {
            let market = pool.market_id();
            if !engine.authorized_markets.contains(&market) {
                return Err(Error::MarketNotAuthorized(market.to_string()));
            }
            let key = (market, user);
            if engine.active_index.contains_key(&key) {
                return Err(Error::AuctionAlreadyActive {
                    market: market.to_string(),
                    user: user.to_string(),
                });
            }

            pool.accrue_interest(now)?;
            let health = pool.health_factor(user, oracle, now)?;
            if health >= WAD {
                return Err(Error::PositionHealthy {
                    health_factor: health,
                });
            }

            let config = pool.config().clone();
            let total_debt = pool.debt_of(user)?;
            let collateral_price = oracle.get_price(config.collateral_token, now)?.price;
            let borrow_price = oracle.get_price(config.borrow_token, now)?.price;

            let mut debt_to_repay = w_mul_down(total_debt, config.params.close_factor)?;
            validate_non_zero(debt_to_repay)?;

            // Collateral covering the debt plus the liquidation penalty
            let debt_value = value_usd(
                debt_to_repay,
                borrow_price,
                config.borrow_decimals,
                Rounding::Up,
            )?;
            let seize_value = w_mul_up(debt_value, checked_add(WAD, config.params.liquidation_penalty)?)?;
            let mut collateral_for_sale = amount_from_usd(
                seize_value,
                collateral_price,
                config.collateral_decimals,
                Rounding::Down,
            )?;

            let available = pool
                .position(user)
                .map(|p| p.free_collateral())
                .unwrap_or(0);
            if collateral_for_sale > available {
                // Cap at the user's collateral and recompute the debt
                // downward so the penalty ratio survives the cap
                collateral_for_sale = available;
                let capped_value = value_usd(
                    collateral_for_sale,
                    collateral_price,
                    config.collateral_decimals,
                    Rounding::Down,
                )?;
                let relieved_value = mul_div(
                    capped_value,
                    WAD,
                    checked_add(WAD, config.params.liquidation_penalty)?,
                    Rounding::Down,
                )?;
                debt_to_repay = amount_from_usd(
                    relieved_value,
                    borrow_price,
                    config.borrow_decimals,
                    Rounding::Down,
                )?;
            }
            validate_non_zero(collateral_for_sale)?;
            validate_non_zero(debt_to_repay)?;

            // Premium/discount bracket around the oracle reference price
            let reference = mul_div(collateral_price, WAD, borrow_price, Rounding::Down)?;
            let start_price = w_mul_down(reference, engine.params.start_premium)?;
            let end_price = w_mul_down(reference, engine.params.end_discount)?;

            pool.lock_collateral_for_liquidation(engine.account, user, collateral_for_sale)?;

            let id = AuctionId::new(engine.next_auction_seq);
            engine.next_auction_seq += 1;
            let auction = Auction {
                id,
                market,
                user,
                debt_to_repay,
                collateral_for_sale,
                start_time: now,
                end_time: now + engine.params.duration_secs,
                start_price,
                end_price,
                status: AuctionStatus::Active,
            };
            engine.auctions.insert(id, auction);
            engine.active_index.insert(key, id);
            engine.stats.total_auctions += 1;

            tracing::info!(
                %id,
                %market,
                %user,
                debt_to_repay,
                collateral_for_sale,
                start_price,
                end_price,
                "auction started"
            );
            Ok(id)
        })
    }

    /// Current Dutch price of an active auction
    pub fn current_price(&self, id: AuctionId, now: u64) -> Result<u128> {
        let auction = self.auctions.get(&id).ok_or(Error::AuctionNotFound(id.seq()))?;
        if !auction.is_active() {
            return Err(Error::AuctionNotActive(id.seq()));
        }
        auction.current_price(now)
    }

    /// Fill an active auction with up to `max_debt_to_repay` of debt.
    ///
    /// Any caller may fill. Payment is pulled from the caller, settlement
    /// runs through the pool's `execute_liquidation`, and seized collateral
    /// is delivered to the caller. The auction closes once either remaining
    /// side reaches zero.
    #[allow(clippy::too_many_arguments)]
    pub fn liquidate(
        &mut self,
        caller: AccountId,
        id: AuctionId,
        max_debt_to_repay: u128,
        pool: &mut LedgerPool,
        borrow_token: &mut dyn FungibleToken,
        collateral_token: &mut dyn FungibleToken,
        now: u64,
    ) -> Result<FillEvent> {
        self.with_guard(|engine| {
            validate_non_zero(max_debt_to_repay)?;

            let auction = *engine
                .auctions
                .get(&id)
                .ok_or(Error::AuctionNotFound(id.seq()))?;
            if !auction.is_active() {
                return Err(Error::AuctionNotActive(id.seq()));
            }
            if auction.is_expired(now) {
                return Err(Error::AuctionExpired(id.seq()));
            }

            let config = pool.config().clone();
            pool.accrue_interest(now)?;

            let price = auction.current_price(now)?;
            let mut debt_repaid = max_debt_to_repay.min(auction.debt_to_repay);
            let mut collateral_received = debt_to_collateral(
                debt_repaid,
                price,
                config.borrow_decimals,
                config.collateral_decimals,
                Rounding::Down,
            )?;

            if collateral_received > auction.collateral_for_sale {
                // Cap at what is left on offer and shrink the debt
                // proportionally; debt owed rounds up
                collateral_received = auction.collateral_for_sale;
                debt_repaid = collateral_to_debt(
                    collateral_received,
                    price,
                    config.borrow_decimals,
                    config.collateral_decimals,
                    Rounding::Up,
                )?
                .min(auction.debt_to_repay);
            }
            validate_non_zero(collateral_received)?;
            validate_non_zero(debt_repaid)?;

            // Pull payment, settle through the pool, deliver collateral
            borrow_token.transfer(caller, pool.account(), debt_repaid)?;
            pool.execute_liquidation(
                engine.account,
                auction.user,
                caller,
                debt_repaid,
                collateral_received,
                collateral_token,
            )?;

            let entry = engine
                .auctions
                .get_mut(&id)
                .ok_or(Error::AuctionNotFound(id.seq()))?;
            entry.debt_to_repay = zero_floor_sub(entry.debt_to_repay, debt_repaid);
            entry.collateral_for_sale = zero_floor_sub(entry.collateral_for_sale, collateral_received);

            let closed = entry.debt_to_repay == 0 || entry.collateral_for_sale == 0;
            let leftover = entry.collateral_for_sale;
            if closed {
                entry.status = AuctionStatus::Completed;
                entry.collateral_for_sale = 0;
                engine.active_index.remove(&(auction.market, auction.user));
                if leftover > 0 {
                    // Debt side filled first: hand unsold collateral back
                    pool.unlock_collateral_after_liquidation(engine.account, auction.user, leftover)?;
                }
            }

            let event = FillEvent {
                auction_id: id,
                market: auction.market,
                user: auction.user,
                liquidator: caller,
                debt_repaid,
                collateral_received,
                price,
                timestamp: now,
            };
            engine.push_fill(event);
            engine.stats.total_fills += 1;
            engine.stats.total_debt_repaid = engine
                .stats
                .total_debt_repaid
                .saturating_add(debt_repaid);
            engine.stats.total_collateral_sold = engine
                .stats
                .total_collateral_sold
                .saturating_add(collateral_received);

            tracing::info!(
                %id,
                %caller,
                debt_repaid,
                collateral_received,
                price,
                closed,
                "auction filled"
            );
            Ok(event)
        })
    }

    /// Cancel an auction left unfilled past its deadline; callable by
    /// anyone. Restores the locked collateral to the position.
    pub fn cancel_expired_auction(
        &mut self,
        id: AuctionId,
        pool: &mut LedgerPool,
        now: u64,
    ) -> Result<()> {
        self.with_guard(|engine| {
            let auction = *engine
                .auctions
                .get(&id)
                .ok_or(Error::AuctionNotFound(id.seq()))?;
            if !auction.is_active() {
                return Err(Error::AuctionNotActive(id.seq()));
            }
            if !auction.is_expired(now) {
                return Err(Error::AuctionNotExpired {
                    id: id.seq(),
                    ends_at: auction.end_time,
                });
            }

            if auction.collateral_for_sale > 0 {
                pool.unlock_collateral_after_liquidation(
                    engine.account,
                    auction.user,
                    auction.collateral_for_sale,
                )?;
            }

            let entry = engine
                .auctions
                .get_mut(&id)
                .ok_or(Error::AuctionNotFound(id.seq()))?;
            entry.status = AuctionStatus::Cancelled;
            engine.active_index.remove(&(auction.market, auction.user));
            engine.stats.total_cancelled += 1;

            tracing::info!(%id, user = %auction.user, "auction cancelled after expiry");
            Ok(())
        })
    }

    /// Advisory profit estimate for filling `debt_amount` right now, in WAD
    /// USD at oracle prices. Not authoritative; aids a caller's fill
    /// decision.
    pub fn calculate_profit(
        &self,
        id: AuctionId,
        debt_amount: u128,
        pool: &LedgerPool,
        oracle: &PriceOracle,
        now: u64,
    ) -> Result<i128> {
        let auction = self.auctions.get(&id).ok_or(Error::AuctionNotFound(id.seq()))?;
        if !auction.is_active() {
            return Err(Error::AuctionNotActive(id.seq()));
        }

        let config = pool.config();
        let price = auction.current_price(now)?;
        let debt_repaid = debt_amount.min(auction.debt_to_repay);
        let collateral_received = debt_to_collateral(
            debt_repaid,
            price,
            config.borrow_decimals,
            config.collateral_decimals,
            Rounding::Down,
        )?
        .min(auction.collateral_for_sale);

        let collateral_price = oracle.get_price(config.collateral_token, now)?.price;
        let borrow_price = oracle.get_price(config.borrow_token, now)?.price;

        let proceeds = value_usd(
            collateral_received,
            collateral_price,
            config.collateral_decimals,
            Rounding::Down,
        )?;
        let cost = value_usd(debt_repaid, borrow_price, config.borrow_decimals, Rounding::Up)?;

        let proceeds = i128::try_from(proceeds).map_err(|_| Error::Overflow {
            operation: "profit proceeds".into(),
        })?;
        let cost = i128::try_from(cost).map_err(|_| Error::Overflow {
            operation: "profit cost".into(),
        })?;
        Ok(proceeds - cost)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    fn with_guard<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.entered {
            return Err(Error::ReentrantCall);
        }
        self.entered = true;
        let result = f(self);
        self.entered = false;
        result
    }

    fn push_fill(&mut self, event: FillEvent) {
        self.fills.push(event);
        if self.fills.len() > self.max_events {
            let excess = self.fills.len() - self.max_events;
            self.fills.drain(0..excess);
        }
    }
}

/// Collateral units bought by `debt` at a WAD price of borrow-per-collateral
fn debt_to_collateral(
    debt: u128,
    price_wad: u128,
    borrow_decimals: u8,
    collateral_decimals: u8,
    rounding: Rounding,
) -> Result<u128> {
    mul_div_wide(
        debt,
        WAD,
        pow10(collateral_decimals),
        price_wad,
        pow10(borrow_decimals),
        rounding,
    )
}

/// Debt covered by selling `collateral` at a WAD price of
/// borrow-per-collateral
fn collateral_to_debt(
    collateral: u128,
    price_wad: u128,
    borrow_decimals: u8,
    collateral_decimals: u8,
    rounding: Rounding,
) -> Result<u128> {
    mul_div_wide(
        collateral,
        price_wad,
        pow10(borrow_decimals),
        WAD,
        pow10(collateral_decimals),
        rounding,
    )
}
