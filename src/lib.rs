//! # isolend
//!
//! The financial engine of an isolated-market lending protocol: share-based
//! supply/borrow accounting with continuous interest accrual, collateral
//! health evaluation, and Dutch-auction liquidation.
//!
//! ## Architecture
//!
//! The engine consists of several core modules:
//!
//! - **Core**: fundamental types, the kinked interest-rate model, and the
//!   market ledger ([`core::pool::LedgerPool`])
//! - **Oracle**: dual-source price resolution with staleness, deviation and
//!   liveness checks
//! - **Liquidation**: Dutch-auction lifecycle consuming the pool's
//!   liquidation hooks
//!
//! Data flows one way: fixed-point math underlies every numeric operation;
//! the rate model and the price oracle are pure/read-only inputs to the
//! ledger; the ledger exposes liquidation hooks consumed exclusively by the
//! auction engine.
//!
//! ## Design Principles
//!
//! - **Isolated**: each market is one independently owned aggregate; no
//!   cross-market state except read-only price lookups
//! - **Rounded against the caller**: every share/asset conversion names its
//!   rounding direction, always favoring the pool over the user
//! - **Atomic**: every constraint check precedes the first state write, so a
//!   failed operation leaves no partial state behind
//!
//! ## Example
//!
//! ```rust,ignore
//! use isolend::prelude::*;
//!
//! let mut pool = LedgerPool::new(config, rate_model, now)?;
//! pool.initialize(owner, factory, liquidator)?;
//!
//! let shares = pool.deposit(supplier, 100_000, &mut usdc, now)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod core;
pub mod error;
pub mod liquidation;
pub mod oracle;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        ids::{AccountId, AuctionId, MarketId, TokenId},
        irm::InterestRateModel,
        market::{MarketParams, MarketSnapshot, MarketState},
        pool::{LedgerPool, PoolConfig},
        position::Position,
        token::{FungibleToken, InMemoryToken, ReceiptToken},
    };
    pub use crate::error::{Error, Result};
    pub use crate::liquidation::{
        auction::{Auction, AuctionStatus},
        engine::{AuctionParams, DutchAuctionLiquidator},
    };
    pub use crate::oracle::{
        feed::{LivenessData, LivenessFeed, RoundData, RoundFeed},
        router::{OracleConfig, PriceOracle, PriceResult, PriceSource},
        twap::TickSource,
    };
    pub use crate::utils::{constants::WAD, math::Rounding};
}

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name
pub const ENGINE_NAME: &str = "isolend";
