//! Token interfaces and in-memory implementations.
//!
//! The engine consumes fungible tokens through the [`FungibleToken`]
//! contract and treats them as untrusted: transfers happen strictly before
//! (pull) or strictly after (push) internal ledger mutation, never
//! interleaved with it. Suppliers receive a [`ReceiptToken`] claim on the
//! supply ledger, mintable and burnable only by the owning pool.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::ids::{AccountId, TokenId};
use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// FUNGIBLE TOKEN CONTRACT
// ═══════════════════════════════════════════════════════════════════════════════

/// External fungible-token contract consumed for both collateral and borrow
/// assets.
///
/// In a function-call boundary the host authenticates callers, so pull-style
/// and push-style movement collapse into one `transfer` with an explicit
/// source account.
pub trait FungibleToken {
    /// Identity of this token
    fn id(&self) -> TokenId;

    /// Decimal places of one whole token
    fn decimals(&self) -> u8;

    /// Balance of an account in raw units
    fn balance_of(&self, account: AccountId) -> u128;

    /// Move `amount` raw units from `from` to `to`
    fn transfer(&mut self, from: AccountId, to: AccountId, amount: u128) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

/// Plain balance-map token used by harnesses and tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryToken {
    id: TokenId,
    /// Ticker symbol, for logs only
    pub symbol: String,
    decimals: u8,
    balances: HashMap<AccountId, u128>,
    total_supply: u128,
}

impl InMemoryToken {
    /// Create an empty token ledger
    pub fn new(id: TokenId, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            decimals,
            balances: HashMap::new(),
            total_supply: 0,
        }
    }

    /// Credit fresh units to an account (harness setup)
    pub fn mint(&mut self, to: AccountId, amount: u128) -> Result<()> {
        let balance = self.balances.entry(to).or_insert(0);
        *balance = balance.checked_add(amount).ok_or_else(|| Error::Overflow {
            operation: "token mint".into(),
        })?;
        self.total_supply =
            self.total_supply
                .checked_add(amount)
                .ok_or_else(|| Error::Overflow {
                    operation: "token mint supply".into(),
                })?;
        Ok(())
    }

    /// Total units in circulation
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }
}

impl FungibleToken for InMemoryToken {
    fn id(&self) -> TokenId {
        self.id
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn balance_of(&self, account: AccountId) -> u128 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    fn transfer(&mut self, from: AccountId, to: AccountId, amount: u128) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(Error::InsufficientBalance {
                requested: amount,
                available: from_balance,
            });
        }

        self.balances.insert(from, from_balance - amount);
        let to_balance = self.balances.entry(to).or_insert(0);
        *to_balance = to_balance.checked_add(amount).ok_or_else(|| Error::Overflow {
            operation: "token transfer".into(),
        })?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECEIPT TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

/// Tokenized claim on a pool's supply ledger.
///
/// Balances are WAD-scaled supply shares. Mint and burn are gated to the
/// owning pool's account; transfers between suppliers are unrestricted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptToken {
    /// Display name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    owner: AccountId,
    balances: HashMap<AccountId, u128>,
    total_supply: u128,
}

impl ReceiptToken {
    /// Create a receipt token owned by `owner` (the pool's account)
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, owner: AccountId) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            owner,
            balances: HashMap::new(),
            total_supply: 0,
        }
    }

    /// The owning pool's account
    pub fn owner(&self) -> AccountId {
        self.owner
    }

    /// Share balance of an account
    pub fn balance_of(&self, account: AccountId) -> u128 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    /// Shares outstanding
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Mint shares to `to`; only the owning pool may call
    pub fn mint(&mut self, caller: AccountId, to: AccountId, shares: u128) -> Result<()> {
        if caller != self.owner {
            return Err(Error::OnlyOwner);
        }

        let balance = self.balances.entry(to).or_insert(0);
        *balance = balance.checked_add(shares).ok_or_else(|| Error::Overflow {
            operation: "receipt mint".into(),
        })?;
        self.total_supply =
            self.total_supply
                .checked_add(shares)
                .ok_or_else(|| Error::Overflow {
                    operation: "receipt mint supply".into(),
                })?;
        Ok(())
    }

    /// Burn shares from `from`; only the owning pool may call
    pub fn burn(&mut self, caller: AccountId, from: AccountId, shares: u128) -> Result<()> {
        if caller != self.owner {
            return Err(Error::OnlyOwner);
        }

        let balance = self.balance_of(from);
        if balance < shares {
            return Err(Error::InsufficientBalance {
                requested: shares,
                available: balance,
            });
        }

        self.balances.insert(from, balance - shares);
        self.total_supply -= shares;
        Ok(())
    }

    /// Move shares between suppliers
    pub fn transfer(&mut self, from: AccountId, to: AccountId, shares: u128) -> Result<()> {
        let from_balance = self.balance_of(from);
        if from_balance < shares {
            return Err(Error::InsufficientBalance {
                requested: shares,
                available: from_balance,
            });
        }

        self.balances.insert(from, from_balance - shares);
        let to_balance = self.balances.entry(to).or_insert(0);
        *to_balance = to_balance.checked_add(shares).ok_or_else(|| Error::Overflow {
            operation: "receipt transfer".into(),
        })?;
        Ok(())
    }
}
