//! Opaque identifiers for principals, tokens, markets and auctions.
//!
//! These are plain newtypes: the host execution environment authenticates
//! callers, the engine only compares identities.

use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════════
// ACCOUNT ID
// ═══════════════════════════════════════════════════════════════════════════════

/// A principal: user, pool, liquidator or factory
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct AccountId([u8; 20]);

impl AccountId {
    /// The zero address, never a valid principal
    pub const ZERO: Self = Self([0u8; 20]);

    /// Create from raw bytes
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Convenience constructor spreading a small integer into the low bytes
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this is the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN ID
// ═══════════════════════════════════════════════════════════════════════════════

/// A fungible token identity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TokenId([u8; 20]);

impl TokenId {
    /// Create from raw bytes
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Convenience constructor spreading a small integer into the low bytes
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MARKET & AUCTION IDS
// ═══════════════════════════════════════════════════════════════════════════════

/// An isolated market, assigned by the (out-of-scope) factory
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct MarketId(u64);

impl MarketId {
    /// Create from a raw index
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Raw index
    pub fn index(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "market-{}", self.0)
    }
}

/// A Dutch auction, assigned sequentially by the liquidation engine
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct AuctionId(u64);

impl AuctionId {
    /// Create from a raw sequence number
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Raw sequence number
    pub fn seq(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AuctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "auction-{}", self.0)
    }
}
