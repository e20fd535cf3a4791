//! Error types for the isolend engine.
//!
//! Every constraint violation aborts the whole operation with a distinct,
//! identifiable error kind so automated callers (e.g. a liquidation bot) can
//! branch on the failure: skip, retry with a smaller amount, or wait.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the isolend engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Amount is zero
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// A principal address is the zero address
    #[error("Address cannot be zero")]
    ZeroAddress,

    /// Collateral and borrow token are the same asset
    #[error("Collateral and borrow token must differ")]
    IdenticalTokens,

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Supplied timestamp precedes the last recorded one
    #[error("Timestamp {now} precedes last accrual at {last_update}")]
    InvalidTimestamp {
        /// Timestamp supplied by the caller
        now: u64,
        /// Last recorded accrual timestamp
        last_update: u64,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Caller is not the configured liquidator principal
    #[error("Only the configured liquidator may call this")]
    OnlyLiquidator,

    /// Caller is not the market owner
    #[error("Only the market owner may call this")]
    OnlyOwner,

    /// Caller is not the authorized factory principal
    #[error("Only the authorized factory may call this")]
    OnlyFactory,

    /// Market has not been enrolled with the liquidator
    #[error("Market {0} is not authorized for liquidation")]
    MarketNotAuthorized(String),

    /// Market principals have already been set
    #[error("Market is already initialized")]
    AlreadyInitialized,

    /// Market principals have not been set yet
    #[error("Market is not initialized")]
    MarketNotInitialized,

    // ═══════════════════════════════════════════════════════════════════
    // Liquidity & Solvency Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Pool does not hold enough un-borrowed assets
    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity {
        /// Amount requested
        requested: u128,
        /// Amount available
        available: u128,
    },

    /// Caller's balance (shares, collateral or tokens) is too small
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Amount requested
        requested: u128,
        /// Amount available
        available: u128,
    },

    /// Operation would push the position below the health threshold
    #[error("Operation would leave position undercollateralized (health factor {health_factor})")]
    WouldBeUndercollateralized {
        /// Post-operation health factor (WAD)
        health_factor: u128,
    },

    /// Position is healthy and cannot be liquidated
    #[error("Position is healthy (health factor {health_factor})")]
    PositionHealthy {
        /// Current health factor (WAD)
        health_factor: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Auction Errors
    // ═══════════════════════════════════════════════════════════════════

    /// An auction already exists for this (market, user) pair
    #[error("Active auction already exists for {user} on market {market}")]
    AuctionAlreadyActive {
        /// Market identifier
        market: String,
        /// Borrower under auction
        user: String,
    },

    /// Auction id is unknown
    #[error("Auction {0} not found")]
    AuctionNotFound(u64),

    /// Auction is completed or cancelled
    #[error("Auction {0} is not active")]
    AuctionNotActive(u64),

    /// Auction deadline has passed
    #[error("Auction {0} has expired")]
    AuctionExpired(u64),

    /// Auction deadline has not passed yet
    #[error("Auction {id} has not expired yet (ends at {ends_at})")]
    AuctionNotExpired {
        /// Auction identifier
        id: u64,
        /// Deadline timestamp
        ends_at: u64,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Oracle Errors
    // ═══════════════════════════════════════════════════════════════════

    /// No oracle configured for the token
    #[error("No oracle configured for token {0}")]
    OracleNotConfigured(String),

    /// Price is stale (not updated recently)
    #[error("Price is stale: last update {age}s ago, max allowed {max_age}s")]
    StalePrice {
        /// Seconds since last update
        age: u64,
        /// Maximum allowed age in seconds
        max_age: u64,
    },

    /// Primary and fallback prices disagree beyond the tolerance
    #[error("Price deviation {deviation_bps}bps exceeds maximum {max_deviation_bps}bps")]
    PriceDeviationTooHigh {
        /// Observed deviation in basis points
        deviation_bps: u128,
        /// Maximum allowed deviation in basis points
        max_deviation_bps: u128,
    },

    /// Neither the primary nor the fallback source produced a valid price
    #[error("All price sources failed")]
    OraclesUnavailable,

    /// The execution-environment liveness feed reports down
    #[error("Liveness feed reports the execution environment down")]
    LivenessFeedDown,

    /// The execution environment came back up too recently
    #[error("Liveness grace period active: {remaining_secs}s remaining")]
    LivenessGraceActive {
        /// Seconds until the grace period elapses
        remaining_secs: u64,
    },

    /// Primary feed round has not completed
    #[error("Oracle round {round_id} is incomplete")]
    IncompleteRound {
        /// Round identifier
        round_id: u64,
    },

    /// Primary feed answered with a non-positive price
    #[error("Oracle answer is not positive")]
    NonPositiveAnswer,

    // ═══════════════════════════════════════════════════════════════════
    // Arithmetic Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Division by zero
    #[error("Division by zero in {operation}")]
    DivisionByZero {
        /// Operation that divided by zero
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// A state-mutating entry point was re-entered
    #[error("Reentrant call rejected")]
    ReentrantCall,

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// Returns true if retrying the same call later may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientLiquidity { .. }
                | Error::StalePrice { .. }
                | Error::OraclesUnavailable
                | Error::LivenessFeedDown
                | Error::LivenessGraceActive { .. }
                | Error::AuctionNotExpired { .. }
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_)
                | Error::Overflow { .. }
                | Error::DivisionByZero { .. }
                | Error::ReentrantCall
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Validation errors: 1xxx
            Error::ZeroAmount => 1001,
            Error::ZeroAddress => 1002,
            Error::IdenticalTokens => 1003,
            Error::InvalidParameter { .. } => 1004,
            Error::InvalidTimestamp { .. } => 1005,

            // Authorization errors: 2xxx
            Error::OnlyLiquidator => 2001,
            Error::OnlyOwner => 2002,
            Error::OnlyFactory => 2003,
            Error::MarketNotAuthorized(_) => 2004,
            Error::AlreadyInitialized => 2005,
            Error::MarketNotInitialized => 2006,

            // Liquidity & solvency errors: 3xxx
            Error::InsufficientLiquidity { .. } => 3001,
            Error::InsufficientBalance { .. } => 3002,
            Error::WouldBeUndercollateralized { .. } => 3003,
            Error::PositionHealthy { .. } => 3004,

            // Auction errors: 4xxx
            Error::AuctionAlreadyActive { .. } => 4001,
            Error::AuctionNotFound(_) => 4002,
            Error::AuctionNotActive(_) => 4003,
            Error::AuctionExpired(_) => 4004,
            Error::AuctionNotExpired { .. } => 4005,

            // Oracle errors: 5xxx
            Error::OracleNotConfigured(_) => 5001,
            Error::StalePrice { .. } => 5002,
            Error::PriceDeviationTooHigh { .. } => 5003,
            Error::OraclesUnavailable => 5004,
            Error::LivenessFeedDown => 5005,
            Error::LivenessGraceActive { .. } => 5006,
            Error::IncompleteRound { .. } => 5007,
            Error::NonPositiveAnswer => 5008,

            // Arithmetic errors: 6xxx
            Error::Overflow { .. } => 6001,
            Error::DivisionByZero { .. } => 6002,

            // Internal errors: 9xxx
            Error::ReentrantCall => 9001,
            Error::Serialization(_) => 9002,
            Error::Deserialization(_) => 9003,
            Error::InvariantViolation(_) => 9004,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            Error::ZeroAmount.code(),
            Error::IdenticalTokens.code(),
            Error::OnlyLiquidator.code(),
            Error::MarketNotInitialized.code(),
            Error::InsufficientLiquidity { requested: 0, available: 0 }.code(),
            Error::WouldBeUndercollateralized { health_factor: 0 }.code(),
            Error::AuctionExpired(0).code(),
            Error::StalePrice { age: 0, max_age: 0 }.code(),
            Error::OraclesUnavailable.code(),
            Error::Overflow { operation: "".into() }.code(),
            Error::ReentrantCall.code(),
        ];

        let mut unique = codes.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(codes.len(), unique.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientLiquidity {
            requested: 1000,
            available: 500,
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::InsufficientLiquidity { requested: 0, available: 0 }.is_recoverable());
        assert!(Error::StalePrice { age: 10, max_age: 5 }.is_recoverable());
        assert!(!Error::OnlyLiquidator.is_recoverable());
    }

    #[test]
    fn test_is_critical() {
        assert!(Error::InvariantViolation("test".into()).is_critical());
        assert!(Error::Overflow { operation: "test".into() }.is_critical());
        assert!(!Error::ZeroAmount.is_critical());
    }
}
