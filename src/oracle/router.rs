//! Dual-source price resolution.
//!
//! For each configured token the router reads the primary round-based feed
//! and, when configured, the fallback tick TWAP, then arbitrates:
//!
//! | primary | fallback | deviation <= 5% | result                    |
//! |---------|----------|-----------------|---------------------------|
//! | valid   | valid    | yes             | primary (direct)          |
//! | valid   | valid    | no              | fail: deviation too high  |
//! | valid   | invalid  | -               | primary (direct)          |
//! | invalid | valid    | -               | fallback (flagged)        |
//! | invalid | invalid  | -               | fail: sources unavailable |
//!
//! Before any read the execution-environment liveness feed is consulted: a
//! down environment, or one inside its post-recovery grace window, fails the
//! read outright.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::core::ids::TokenId;
use crate::error::{Error, Result};
use crate::oracle::feed::{normalize_answer, validate_round, LivenessFeed, RoundFeed};
use crate::oracle::twap::{consult, TickSource};
use crate::utils::constants::{BPS_DIVISOR, DEFAULT_LIVENESS_GRACE_SECS, MAX_PRICE_DEVIATION_BPS};
use crate::utils::validation::validate_duration;

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Which source produced a price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSource {
    /// The primary round-based feed
    Direct,
    /// The fallback TWAP
    Fallback,
}

/// A resolved price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceResult {
    /// WAD-scaled USD price of one whole token
    pub price: u128,
    /// Timestamp the price refers to
    pub timestamp: u64,
    /// Source that produced it
    pub source: PriceSource,
}

impl PriceResult {
    /// Whether the fallback produced this price
    pub fn used_fallback(&self) -> bool {
        self.source == PriceSource::Fallback
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-token oracle configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Maximum primary-feed age in seconds
    pub max_staleness: u64,
    /// Fallback TWAP window in seconds
    pub twap_window: u64,
    /// Token-ordering flag: the priced token is the fallback pool's quote
    /// token
    pub invert: bool,
}

impl OracleConfig {
    /// Validate configuration consistency
    pub fn validate(&self, has_fallback: bool) -> Result<()> {
        validate_duration(self.max_staleness, "max_staleness")?;
        if has_fallback {
            validate_duration(self.twap_window, "twap_window")?;
        }
        Ok(())
    }
}

struct TokenOracle {
    config: OracleConfig,
    primary: Box<dyn RoundFeed>,
    fallback: Option<Box<dyn TickSource>>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE ORACLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Dual-source price oracle over a set of configured tokens
pub struct PriceOracle {
    tokens: HashMap<TokenId, TokenOracle>,
    liveness: Option<Box<dyn LivenessFeed>>,
    liveness_grace: u64,
    max_deviation_bps: u128,
}

impl fmt::Debug for PriceOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriceOracle")
            .field("tokens", &self.tokens.keys().collect::<Vec<_>>())
            .field("has_liveness", &self.liveness.is_some())
            .field("liveness_grace", &self.liveness_grace)
            .field("max_deviation_bps", &self.max_deviation_bps)
            .finish()
    }
}

impl Default for PriceOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceOracle {
    /// Oracle with no tokens configured and no liveness feed
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
            liveness: None,
            liveness_grace: DEFAULT_LIVENESS_GRACE_SECS,
            max_deviation_bps: MAX_PRICE_DEVIATION_BPS,
        }
    }

    /// Install the execution-environment liveness feed
    pub fn set_liveness_feed(&mut self, feed: Box<dyn LivenessFeed>, grace_secs: u64) {
        self.liveness = Some(feed);
        self.liveness_grace = grace_secs;
    }

    /// Configure a token's price sources
    pub fn configure_token(
        &mut self,
        token: TokenId,
        config: OracleConfig,
        primary: Box<dyn RoundFeed>,
        fallback: Option<Box<dyn TickSource>>,
    ) -> Result<()> {
        config.validate(fallback.is_some())?;
        self.tokens.insert(
            token,
            TokenOracle {
                config,
                primary,
                fallback,
            },
        );
        Ok(())
    }

    /// Whether a token has an oracle configured
    pub fn is_configured(&self, token: TokenId) -> bool {
        self.tokens.contains_key(&token)
    }

    /// Resolve a token's WAD USD price at `now`
    pub fn get_price(&self, token: TokenId, now: u64) -> Result<PriceResult> {
        self.check_liveness(now)?;

        let entry = self
            .tokens
            .get(&token)
            .ok_or_else(|| Error::OracleNotConfigured(token.to_string()))?;

        let primary = Self::read_primary(entry, now);
        let fallback = entry
            .fallback
            .as_ref()
            .map(|source| consult(source.as_ref(), entry.config.twap_window, entry.config.invert));

        match (primary, fallback) {
            (Ok((price, timestamp)), Some(Ok(twap))) => {
                let deviation = deviation_bps(price, twap);
                if deviation > self.max_deviation_bps {
                    return Err(Error::PriceDeviationTooHigh {
                        deviation_bps: deviation,
                        max_deviation_bps: self.max_deviation_bps,
                    });
                }
                Ok(PriceResult {
                    price,
                    timestamp,
                    source: PriceSource::Direct,
                })
            }
            (Ok((price, timestamp)), Some(Err(twap_err))) => {
                tracing::debug!(%token, error = %twap_err, "fallback source invalid, using primary");
                Ok(PriceResult {
                    price,
                    timestamp,
                    source: PriceSource::Direct,
                })
            }
            (Ok((price, timestamp)), None) => Ok(PriceResult {
                price,
                timestamp,
                source: PriceSource::Direct,
            }),
            (Err(primary_err), Some(Ok(twap))) => {
                tracing::warn!(%token, error = %primary_err, "primary feed invalid, using fallback TWAP");
                Ok(PriceResult {
                    price: twap,
                    timestamp: now,
                    source: PriceSource::Fallback,
                })
            }
            (Err(primary_err), fallback_result) => {
                tracing::debug!(%token, error = %primary_err, "primary feed invalid");
                if let Some(Err(twap_err)) = fallback_result {
                    tracing::debug!(%token, error = %twap_err, "fallback source invalid");
                }
                Err(Error::OraclesUnavailable)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    fn read_primary(entry: &TokenOracle, now: u64) -> Result<(u128, u64)> {
        let round = entry.primary.latest_round()?;
        validate_round(&round, now, entry.config.max_staleness)?;
        let price = normalize_answer(round.answer, entry.primary.decimals())?;
        Ok((price, round.updated_at))
    }

    fn check_liveness(&self, now: u64) -> Result<()> {
        let Some(feed) = &self.liveness else {
            return Ok(());
        };

        let data = feed.latest()?;
        if !data.is_up {
            return Err(Error::LivenessFeedDown);
        }

        let up_for = now.saturating_sub(data.since);
        if up_for < self.liveness_grace {
            return Err(Error::LivenessGraceActive {
                remaining_secs: self.liveness_grace - up_for,
            });
        }
        Ok(())
    }
}

/// Deviation between two prices in basis points, relative to the first
fn deviation_bps(primary: u128, other: u128) -> u128 {
    if primary == 0 {
        return u128::MAX;
    }
    let diff = if other > primary {
        other - primary
    } else {
        primary - other
    };
    // diff is bounded by the larger operand, so the widening product fits
    crate::utils::math::mul_div(diff, BPS_DIVISOR, primary, crate::utils::math::Rounding::Down)
        .unwrap_or(u128::MAX)
}
