//! The market ledger: share-based supply/borrow accounting, interest
//! accrual, collateral custody, health evaluation and liquidation hooks.
//!
//! One [`LedgerPool`] instance is one isolated market. All state-mutating
//! entry points hold a non-reentrant guard for their whole duration, and all
//! constraint checks precede the first state write, so a failed operation
//! leaves no partial state behind. Token movement is pull-before-mutate or
//! push-after-mutate, never interleaved.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::ids::{AccountId, MarketId, TokenId};
use crate::core::irm::{utilization, InterestRateModel};
use crate::core::market::{MarketParams, MarketSnapshot, MarketState};
use crate::core::position::Position;
use crate::core::token::{FungibleToken, ReceiptToken};
use crate::error::{Error, Result};
use crate::oracle::router::PriceOracle;
use crate::utils::constants::{HEALTH_FACTOR_INFINITE, WAD};
use crate::utils::math::{
    amount_from_usd, assets_to_shares, checked_add, mul_div, shares_to_assets, value_usd,
    w_mul_down, zero_floor_sub, Rounding,
};
use crate::utils::validation::{validate_decimals, validate_non_zero};

// ═══════════════════════════════════════════════════════════════════════════════
// POOL CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable configuration of one isolated market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Market identifier assigned by the factory
    pub market_id: MarketId,
    /// The pool's own account in the token ledgers
    pub pool_account: AccountId,
    /// Market owner, allowed to initialize principals and collect reserves
    pub owner: AccountId,
    /// Collateral asset
    pub collateral_token: TokenId,
    /// Borrow asset
    pub borrow_token: TokenId,
    /// Decimals of the collateral asset
    pub collateral_decimals: u8,
    /// Decimals of the borrow asset
    pub borrow_decimals: u8,
    /// Risk parameters
    pub params: MarketParams,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER POOL
// ═══════════════════════════════════════════════════════════════════════════════

/// One isolated market's ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerPool {
    config: PoolConfig,
    irm: InterestRateModel,
    state: MarketState,
    positions: HashMap<AccountId, Position>,
    receipt: ReceiptToken,
    factory: Option<AccountId>,
    liquidator: Option<AccountId>,
    #[serde(skip)]
    entered: bool,
}

impl LedgerPool {
    /// Create a market ledger at timestamp `now`
    pub fn new(config: PoolConfig, irm: InterestRateModel, now: u64) -> Result<Self> {
        if config.pool_account.is_zero() || config.owner.is_zero() {
            return Err(Error::ZeroAddress);
        }
        if config.collateral_token == config.borrow_token {
            return Err(Error::IdenticalTokens);
        }
        validate_decimals(config.collateral_decimals, "collateral_decimals")?;
        validate_decimals(config.borrow_decimals, "borrow_decimals")?;
        config.params.validate()?;

        let receipt = ReceiptToken::new(
            format!("isolend supply receipt {}", config.market_id),
            format!("isoM{}", config.market_id.index()),
            config.pool_account,
        );

        Ok(Self {
            config,
            irm,
            state: MarketState::new(now),
            positions: HashMap::new(),
            receipt,
            factory: None,
            liquidator: None,
            entered: false,
        })
    }

    /// Set the factory and liquidator principals; callable once, by the owner
    pub fn initialize(
        &mut self,
        caller: AccountId,
        factory: AccountId,
        liquidator: AccountId,
    ) -> Result<()> {
        if caller != self.config.owner {
            return Err(Error::OnlyOwner);
        }
        if self.factory.is_some() || self.liquidator.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        if factory.is_zero() || liquidator.is_zero() {
            return Err(Error::ZeroAddress);
        }

        self.factory = Some(factory);
        self.liquidator = Some(liquidator);
        tracing::info!(market = %self.config.market_id, %factory, %liquidator, "market initialized");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Market configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Market identifier
    pub fn market_id(&self) -> MarketId {
        self.config.market_id
    }

    /// The pool's own token-ledger account
    pub fn account(&self) -> AccountId {
        self.config.pool_account
    }

    /// Risk parameters
    pub fn params(&self) -> &MarketParams {
        &self.config.params
    }

    /// Current ledger totals
    pub fn state(&self) -> &MarketState {
        &self.state
    }

    /// A user's position, if one exists
    pub fn position(&self, user: AccountId) -> Option<&Position> {
        self.positions.get(&user)
    }

    /// The supply receipt token
    pub fn receipt(&self) -> &ReceiptToken {
        &self.receipt
    }

    /// Mutable receipt token, for supplier-to-supplier share transfers
    pub fn receipt_mut(&mut self) -> &mut ReceiptToken {
        &mut self.receipt
    }

    /// Un-borrowed assets available for withdrawal or new borrows
    pub fn liquidity(&self) -> u128 {
        self.state.liquidity()
    }

    /// A user's debt in borrow-token units, as of the last accrual
    pub fn debt_of(&self, user: AccountId) -> Result<u128> {
        let position = self.position_or_default(user);
        self.debt_assets(position.borrow_shares)
    }

    /// Read-only ledger summary
    pub fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            total_supply_assets: self.state.total_supply_assets,
            total_supply_shares: self.state.total_supply_shares,
            total_borrow_assets: self.state.total_borrow_assets,
            total_borrow_shares: self.state.total_borrow_shares,
            borrow_index: self.state.borrow_index,
            total_collateral: self.state.total_collateral,
            total_reserves: self.state.total_reserves,
            liquidity: self.state.liquidity(),
            utilization: utilization(
                self.state.total_supply_assets,
                self.state.total_borrow_assets,
            )
            .unwrap_or(0),
            last_accrual_time: self.state.last_accrual_time,
        }
    }

    /// Serialize the ledger to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a ledger from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTEREST ACCRUAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Accrue interest up to `now`.
    ///
    /// Linear per call: `factor = 1 + rate * elapsed`. A second call at the
    /// same timestamp is a no-op; a timestamp before the last accrual fails.
    pub fn accrue_interest(&mut self, now: u64) -> Result<()> {
        self.with_guard(|pool| pool.accrue_inner(now))
    }

    fn accrue_inner(&mut self, now: u64) -> Result<()> {
        let last = self.state.last_accrual_time;
        if now < last {
            return Err(Error::InvalidTimestamp {
                now,
                last_update: last,
            });
        }
        let elapsed = now - last;
        if elapsed == 0 {
            return Ok(());
        }

        let rate = self
            .irm
            .borrow_rate(self.state.total_supply_assets, self.state.total_borrow_assets)?;
        let growth = rate
            .checked_mul(elapsed as u128)
            .ok_or_else(|| Error::Overflow {
                operation: "accrual growth".into(),
            })?;
        let factor = checked_add(WAD, growth)?;

        let new_borrow_assets =
            mul_div(self.state.total_borrow_assets, factor, WAD, Rounding::Down)?;
        let accrued = new_borrow_assets - self.state.total_borrow_assets;
        let to_reserves = w_mul_down(accrued, self.irm.reserve_factor())?;
        let to_suppliers = accrued - to_reserves;

        self.state.total_borrow_assets = new_borrow_assets;
        self.state.total_supply_assets = checked_add(self.state.total_supply_assets, to_suppliers)?;
        self.state.total_reserves = checked_add(self.state.total_reserves, to_reserves)?;
        self.state.borrow_index = mul_div(self.state.borrow_index, factor, WAD, Rounding::Down)?;
        self.state.last_accrual_time = now;

        tracing::debug!(
            market = %self.config.market_id,
            elapsed,
            accrued,
            to_reserves,
            borrow_index = self.state.borrow_index,
            "accrued interest"
        );
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SUPPLY SIDE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit borrow-token assets, minting receipt shares (rounded down)
    pub fn deposit(
        &mut self,
        user: AccountId,
        assets: u128,
        token: &mut dyn FungibleToken,
        now: u64,
    ) -> Result<u128> {
        self.with_guard(|pool| {
            pool.ensure_initialized()?;
            validate_non_zero(assets)?;
            pool.expect_token(token, pool.config.borrow_token)?;
            pool.accrue_inner(now)?;

            // Pull before mutation
            token.transfer(user, pool.config.pool_account, assets)?;

            let shares = assets_to_shares(
                assets,
                pool.state.total_supply_assets,
                pool.state.total_supply_shares,
                Rounding::Down,
            )?;
            pool.state.total_supply_assets = checked_add(pool.state.total_supply_assets, assets)?;
            pool.state.total_supply_shares = checked_add(pool.state.total_supply_shares, shares)?;
            pool.receipt.mint(pool.config.pool_account, user, shares)?;

            tracing::debug!(market = %pool.config.market_id, %user, assets, shares, "deposit");
            Ok(shares)
        })
    }

    /// Withdraw supplied assets, burning receipt shares (rounded up)
    pub fn withdraw(
        &mut self,
        user: AccountId,
        assets: u128,
        token: &mut dyn FungibleToken,
        now: u64,
    ) -> Result<u128> {
        self.with_guard(|pool| {
            pool.ensure_initialized()?;
            validate_non_zero(assets)?;
            pool.expect_token(token, pool.config.borrow_token)?;
            pool.accrue_inner(now)?;

            let shares = assets_to_shares(
                assets,
                pool.state.total_supply_assets,
                pool.state.total_supply_shares,
                Rounding::Up,
            )?;
            let balance = pool.receipt.balance_of(user);
            if shares > balance {
                return Err(Error::InsufficientBalance {
                    requested: shares,
                    available: balance,
                });
            }
            let available = pool.state.liquidity();
            if assets > available {
                return Err(Error::InsufficientLiquidity {
                    requested: assets,
                    available,
                });
            }

            pool.receipt.burn(pool.config.pool_account, user, shares)?;
            pool.state.total_supply_assets -= assets;
            pool.state.total_supply_shares -= shares;

            // Push after mutation
            token.transfer(pool.config.pool_account, user, assets)?;

            tracing::debug!(market = %pool.config.market_id, %user, assets, shares, "withdraw");
            Ok(shares)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COLLATERAL
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit collateral into the caller's position.
    ///
    /// Reads no position value, so it does not accrue.
    pub fn deposit_collateral(
        &mut self,
        user: AccountId,
        amount: u128,
        token: &mut dyn FungibleToken,
    ) -> Result<()> {
        self.with_guard(|pool| {
            pool.ensure_initialized()?;
            validate_non_zero(amount)?;
            pool.expect_token(token, pool.config.collateral_token)?;

            // Pull before mutation
            token.transfer(user, pool.config.pool_account, amount)?;

            let position = pool.positions.entry(user).or_default();
            position.collateral = checked_add(position.collateral, amount)?;
            pool.state.total_collateral = checked_add(pool.state.total_collateral, amount)?;

            tracing::debug!(market = %pool.config.market_id, %user, amount, "deposit collateral");
            Ok(())
        })
    }

    /// Withdraw free collateral; the position must stay healthy afterwards
    pub fn withdraw_collateral(
        &mut self,
        user: AccountId,
        amount: u128,
        token: &mut dyn FungibleToken,
        oracle: &PriceOracle,
        now: u64,
    ) -> Result<()> {
        self.with_guard(|pool| {
            pool.ensure_initialized()?;
            validate_non_zero(amount)?;
            pool.expect_token(token, pool.config.collateral_token)?;
            pool.accrue_inner(now)?;

            let position = pool.position_or_default(user);
            let free = position.free_collateral();
            if amount > free {
                return Err(Error::InsufficientBalance {
                    requested: amount,
                    available: free,
                });
            }

            // Health gate applies only when the position carries debt
            if position.has_debt() {
                let (collateral_price, borrow_price) = pool.prices(oracle, now)?;
                let debt = pool.debt_assets(position.borrow_shares)?;
                let health = pool.health_factor_from(
                    position.collateral - amount,
                    debt,
                    collateral_price,
                    borrow_price,
                )?;
                if health < WAD {
                    return Err(Error::WouldBeUndercollateralized {
                        health_factor: health,
                    });
                }
            }

            let entry = pool.positions.entry(user).or_default();
            entry.collateral -= amount;
            pool.state.total_collateral = zero_floor_sub(pool.state.total_collateral, amount);

            // Push after mutation
            token.transfer(pool.config.pool_account, user, amount)?;

            tracing::debug!(market = %pool.config.market_id, %user, amount, "withdraw collateral");
            Ok(())
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BORROW SIDE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Borrow assets against collateral.
    ///
    /// Borrow shares round up so the borrower owes at least `amount`; the
    /// health check runs against the post-borrow share totals.
    pub fn borrow(
        &mut self,
        user: AccountId,
        amount: u128,
        token: &mut dyn FungibleToken,
        oracle: &PriceOracle,
        now: u64,
    ) -> Result<u128> {
        self.with_guard(|pool| {
            pool.ensure_initialized()?;
            validate_non_zero(amount)?;
            pool.expect_token(token, pool.config.borrow_token)?;
            pool.accrue_inner(now)?;

            let available = pool.state.liquidity();
            if amount > available {
                return Err(Error::InsufficientLiquidity {
                    requested: amount,
                    available,
                });
            }

            let shares = assets_to_shares(
                amount,
                pool.state.total_borrow_assets,
                pool.state.total_borrow_shares,
                Rounding::Up,
            )?;

            let position = pool.position_or_default(user);
            let new_total_assets = checked_add(pool.state.total_borrow_assets, amount)?;
            let new_total_shares = checked_add(pool.state.total_borrow_shares, shares)?;
            let new_position_shares = checked_add(position.borrow_shares, shares)?;

            let debt = shares_to_assets(
                new_position_shares,
                new_total_assets,
                new_total_shares,
                Rounding::Up,
            )?;
            let (collateral_price, borrow_price) = pool.prices(oracle, now)?;
            let health =
                pool.health_factor_from(position.collateral, debt, collateral_price, borrow_price)?;
            if health < WAD {
                return Err(Error::WouldBeUndercollateralized {
                    health_factor: health,
                });
            }

            let entry = pool.positions.entry(user).or_default();
            entry.borrow_shares = new_position_shares;
            pool.state.total_borrow_assets = new_total_assets;
            pool.state.total_borrow_shares = new_total_shares;

            // Push after mutation
            token.transfer(pool.config.pool_account, user, amount)?;

            tracing::debug!(market = %pool.config.market_id, %user, amount, shares, "borrow");
            Ok(shares)
        })
    }

    /// Repay debt on `on_behalf`'s position, capped at the actual debt.
    ///
    /// Third-party repayment is permitted. Returns the assets actually
    /// repaid and the shares burned.
    pub fn repay(
        &mut self,
        payer: AccountId,
        on_behalf: AccountId,
        amount: u128,
        token: &mut dyn FungibleToken,
        now: u64,
    ) -> Result<(u128, u128)> {
        self.with_guard(|pool| {
            pool.ensure_initialized()?;
            validate_non_zero(amount)?;
            pool.expect_token(token, pool.config.borrow_token)?;
            pool.accrue_inner(now)?;

            let position = pool.position_or_default(on_behalf);
            if !position.has_debt() {
                return Ok((0, 0));
            }

            let debt = pool.debt_assets(position.borrow_shares)?;
            let (repaid, shares) = if amount >= debt {
                (debt, position.borrow_shares)
            } else {
                let shares = assets_to_shares(
                    amount,
                    pool.state.total_borrow_assets,
                    pool.state.total_borrow_shares,
                    Rounding::Down,
                )?
                .min(position.borrow_shares);
                (amount, shares)
            };

            // Pull before mutation
            token.transfer(payer, pool.config.pool_account, repaid)?;

            let entry = pool.positions.entry(on_behalf).or_default();
            entry.borrow_shares -= shares;
            pool.state.total_borrow_shares -= shares;
            pool.state.total_borrow_assets = zero_floor_sub(pool.state.total_borrow_assets, repaid);

            tracing::debug!(
                market = %pool.config.market_id,
                %payer,
                %on_behalf,
                repaid,
                shares,
                "repay"
            );
            Ok((repaid, shares))
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // HEALTH
    // ═══════════════════════════════════════════════════════════════════════════

    /// Health factor of a position: risk-adjusted collateral value over debt
    /// value, WAD-scaled. Returns the infinite sentinel when debt is zero.
    pub fn health_factor(
        &mut self,
        user: AccountId,
        oracle: &PriceOracle,
        now: u64,
    ) -> Result<u128> {
        self.with_guard(|pool| {
            pool.ensure_initialized()?;
            pool.accrue_inner(now)?;

            let position = pool.position_or_default(user);
            if !position.has_debt() {
                return Ok(HEALTH_FACTOR_INFINITE);
            }

            let (collateral_price, borrow_price) = pool.prices(oracle, now)?;
            let debt = pool.debt_assets(position.borrow_shares)?;
            pool.health_factor_from(position.collateral, debt, collateral_price, borrow_price)
        })
    }

    /// Whether the position can be liquidated
    pub fn is_liquidatable(
        &mut self,
        user: AccountId,
        oracle: &PriceOracle,
        now: u64,
    ) -> Result<bool> {
        Ok(self.health_factor(user, oracle, now)? < WAD)
    }

    /// Remaining borrow headroom at the LTV ratio, in borrow-token units,
    /// capped by available liquidity
    pub fn get_max_borrow(
        &mut self,
        user: AccountId,
        oracle: &PriceOracle,
        now: u64,
    ) -> Result<u128> {
        self.with_guard(|pool| {
            pool.ensure_initialized()?;
            pool.accrue_inner(now)?;

            let position = pool.position_or_default(user);
            let (collateral_price, borrow_price) = pool.prices(oracle, now)?;

            let collateral_value = value_usd(
                position.collateral,
                collateral_price,
                pool.config.collateral_decimals,
                Rounding::Down,
            )?;
            let borrow_limit = w_mul_down(collateral_value, pool.config.params.ltv)?;

            let debt = pool.debt_assets(position.borrow_shares)?;
            let debt_value = value_usd(
                debt,
                borrow_price,
                pool.config.borrow_decimals,
                Rounding::Up,
            )?;

            let headroom = zero_floor_sub(borrow_limit, debt_value);
            let amount = amount_from_usd(
                headroom,
                borrow_price,
                pool.config.borrow_decimals,
                Rounding::Down,
            )?;
            Ok(amount.min(pool.state.liquidity()))
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RESERVES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Withdraw accrued protocol reserves; owner only
    pub fn collect_reserves(
        &mut self,
        caller: AccountId,
        to: AccountId,
        amount: u128,
        token: &mut dyn FungibleToken,
        now: u64,
    ) -> Result<()> {
        self.with_guard(|pool| {
            pool.ensure_initialized()?;
            if caller != pool.config.owner {
                return Err(Error::OnlyOwner);
            }
            validate_non_zero(amount)?;
            pool.expect_token(token, pool.config.borrow_token)?;
            pool.accrue_inner(now)?;

            if amount > pool.state.total_reserves {
                return Err(Error::InsufficientBalance {
                    requested: amount,
                    available: pool.state.total_reserves,
                });
            }

            pool.state.total_reserves -= amount;

            // Push after mutation
            token.transfer(pool.config.pool_account, to, amount)?;

            tracing::info!(market = %pool.config.market_id, %to, amount, "reserves collected");
            Ok(())
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION HOOKS (liquidator principal only)
    // ═══════════════════════════════════════════════════════════════════════════

    /// Reserve collateral for an auction so it cannot be withdrawn or
    /// double-counted mid-auction
    pub fn lock_collateral_for_liquidation(
        &mut self,
        caller: AccountId,
        user: AccountId,
        amount: u128,
    ) -> Result<()> {
        self.with_guard(|pool| {
            pool.ensure_liquidator(caller)?;
            validate_non_zero(amount)?;

            let position = pool.position_or_default(user);
            let free = position.free_collateral();
            if amount > free {
                return Err(Error::InsufficientBalance {
                    requested: amount,
                    available: free,
                });
            }

            let entry = pool.positions.entry(user).or_default();
            entry.locked_collateral = checked_add(entry.locked_collateral, amount)?;

            tracing::debug!(market = %pool.config.market_id, %user, amount, "collateral locked");
            Ok(())
        })
    }

    /// Release collateral locked for an auction that was cancelled or
    /// closed with unsold collateral
    pub fn unlock_collateral_after_liquidation(
        &mut self,
        caller: AccountId,
        user: AccountId,
        amount: u128,
    ) -> Result<()> {
        self.with_guard(|pool| {
            pool.ensure_liquidator(caller)?;
            validate_non_zero(amount)?;

            let position = pool.position_or_default(user);
            if amount > position.locked_collateral {
                return Err(Error::InsufficientBalance {
                    requested: amount,
                    available: position.locked_collateral,
                });
            }

            let entry = pool.positions.entry(user).or_default();
            entry.locked_collateral -= amount;

            tracing::debug!(market = %pool.config.market_id, %user, amount, "collateral unlocked");
            Ok(())
        })
    }

    /// Settle an auction fill: reduce the user's debt by the share
    /// equivalent of `debt_repaid`, release `collateral_seized` to the
    /// filling liquidator.
    ///
    /// Performs no post-liquidation health check: liquidation is the
    /// mechanism that restores health.
    pub fn execute_liquidation(
        &mut self,
        caller: AccountId,
        user: AccountId,
        recipient: AccountId,
        debt_repaid: u128,
        collateral_seized: u128,
        collateral_token: &mut dyn FungibleToken,
    ) -> Result<()> {
        self.with_guard(|pool| {
            pool.ensure_liquidator(caller)?;
            validate_non_zero(debt_repaid)?;
            validate_non_zero(collateral_seized)?;
            pool.expect_token(collateral_token, pool.config.collateral_token)?;

            let position = pool.position_or_default(user);
            if collateral_seized > position.locked_collateral {
                return Err(Error::InsufficientBalance {
                    requested: collateral_seized,
                    available: position.locked_collateral,
                });
            }

            let shares = assets_to_shares(
                debt_repaid,
                pool.state.total_borrow_assets,
                pool.state.total_borrow_shares,
                Rounding::Down,
            )?
            .min(position.borrow_shares);

            let entry = pool.positions.entry(user).or_default();
            entry.borrow_shares -= shares;
            entry.locked_collateral -= collateral_seized;
            entry.collateral -= collateral_seized;
            pool.state.total_borrow_shares -= shares;
            pool.state.total_borrow_assets =
                zero_floor_sub(pool.state.total_borrow_assets, debt_repaid);
            pool.state.total_collateral =
                zero_floor_sub(pool.state.total_collateral, collateral_seized);

            // Push seized collateral after mutation
            collateral_token.transfer(pool.config.pool_account, recipient, collateral_seized)?;

            tracing::info!(
                market = %pool.config.market_id,
                %user,
                %recipient,
                debt_repaid,
                collateral_seized,
                "liquidation executed"
            );
            Ok(())
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INVARIANTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Verify the ledger invariants hold; used by tests and monitoring
    pub fn check_invariants(&self) -> Result<()> {
        let state = &self.state;

        if (state.total_supply_shares == 0) != (state.total_supply_assets == 0) {
            return Err(Error::InvariantViolation(
                "supply shares and assets must be zero together".into(),
            ));
        }
        if (state.total_borrow_shares == 0) != (state.total_borrow_assets == 0) {
            return Err(Error::InvariantViolation(
                "borrow shares and assets must be zero together".into(),
            ));
        }
        if state.total_borrow_assets > state.total_supply_assets {
            return Err(Error::InvariantViolation(
                "borrows exceed supplied assets".into(),
            ));
        }

        let position_shares: u128 = self
            .positions
            .values()
            .map(|p| p.borrow_shares)
            .try_fold(0u128, |acc, s| acc.checked_add(s))
            .ok_or_else(|| Error::Overflow {
                operation: "position share sum".into(),
            })?;
        if position_shares != state.total_borrow_shares {
            return Err(Error::InvariantViolation(
                "position borrow shares do not sum to the ledger total".into(),
            ));
        }

        let position_collateral: u128 = self
            .positions
            .values()
            .map(|p| p.collateral)
            .try_fold(0u128, |acc, c| acc.checked_add(c))
            .ok_or_else(|| Error::Overflow {
                operation: "position collateral sum".into(),
            })?;
        if position_collateral != state.total_collateral {
            return Err(Error::InvariantViolation(
                "position collateral does not sum to the ledger total".into(),
            ));
        }

        if self.receipt.total_supply() != state.total_supply_shares {
            return Err(Error::InvariantViolation(
                "receipt supply does not match supply shares".into(),
            ));
        }
        Ok(())
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

    fn ensure_initialized(&self) -> Result<()> {
        if self.liquidator.is_none() {
            return Err(Error::MarketNotInitialized);
        }
        Ok(())
    }

    fn ensure_liquidator(&self, caller: AccountId) -> Result<()> {
        let liquidator = self.liquidator.ok_or(Error::MarketNotInitialized)?;
        if caller != liquidator {
            return Err(Error::OnlyLiquidator);
        }
        Ok(())
    }

    fn expect_token(&self, token: &dyn FungibleToken, expected: TokenId) -> Result<()> {
        if token.id() != expected {
            return Err(Error::InvalidParameter {
                name: "token".into(),
                reason: format!("expected {}, got {}", expected, token.id()),
            });
        }
        Ok(())
    }

    fn position_or_default(&self, user: AccountId) -> Position {
        self.positions.get(&user).copied().unwrap_or_default()
    }

    fn debt_assets(&self, borrow_shares: u128) -> Result<u128> {
        shares_to_assets(
            borrow_shares,
            self.state.total_borrow_assets,
            self.state.total_borrow_shares,
            Rounding::Up,
        )
    }

    fn prices(&self, oracle: &PriceOracle, now: u64) -> Result<(u128, u128)> {
        let collateral = oracle.get_price(self.config.collateral_token, now)?;
        let borrow = oracle.get_price(self.config.borrow_token, now)?;
        Ok((collateral.price, borrow.price))
    }

    fn health_factor_from(
        &self,
        collateral: u128,
        debt_assets: u128,
        collateral_price: u128,
        borrow_price: u128,
    ) -> Result<u128> {
        let debt_value = value_usd(
            debt_assets,
            borrow_price,
            self.config.borrow_decimals,
            Rounding::Up,
        )?;
        if debt_value == 0 {
            return Ok(HEALTH_FACTOR_INFINITE);
        }

        let collateral_value = value_usd(
            collateral,
            collateral_price,
            self.config.collateral_decimals,
            Rounding::Down,
        )?;
        let adjusted = w_mul_down(collateral_value, self.config.params.liquidation_threshold)?;
        mul_div(adjusted, WAD, debt_value, Rounding::Down)
    }
}
