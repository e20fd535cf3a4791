//! Primary round-based price feed and execution-environment liveness feed
//! contracts.
//!
//! Both are external interfaces: the engine validates what they report and
//! never trusts them blindly. In-memory `Static*` implementations are
//! published for harnesses and tests.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::WAD;
use crate::utils::math::{mul_div, pow10, Rounding};

// ═══════════════════════════════════════════════════════════════════════════════
// ROUND FEED
// ═══════════════════════════════════════════════════════════════════════════════

/// One round of a primary price feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    /// Round identifier
    pub round_id: u64,
    /// Reported price in the feed's own decimals; may be non-positive on a
    /// broken feed
    pub answer: i128,
    /// Timestamp the answer was recorded at; zero on an unstarted round
    pub updated_at: u64,
    /// Round the answer was computed in; lags `round_id` on an incomplete
    /// round
    pub answered_in_round: u64,
}

/// Primary round-based price source
pub trait RoundFeed {
    /// Latest round reported by the feed
    fn latest_round(&self) -> Result<RoundData>;

    /// Decimals the answer is scaled by
    fn decimals(&self) -> u8;
}

/// Validates round completeness, answer sign and staleness
pub fn validate_round(round: &RoundData, now: u64, max_staleness: u64) -> Result<()> {
    if round.answered_in_round < round.round_id || round.updated_at == 0 {
        return Err(Error::IncompleteRound {
            round_id: round.round_id,
        });
    }
    if round.answer <= 0 {
        return Err(Error::NonPositiveAnswer);
    }

    let age = now.saturating_sub(round.updated_at);
    if age > max_staleness {
        return Err(Error::StalePrice {
            age,
            max_age: max_staleness,
        });
    }
    Ok(())
}

/// Normalizes a positive feed answer to WAD
pub fn normalize_answer(answer: i128, feed_decimals: u8) -> Result<u128> {
    if answer <= 0 {
        return Err(Error::NonPositiveAnswer);
    }
    mul_div(answer as u128, WAD, pow10(feed_decimals), Rounding::Down)
}

/// Fixed-value round feed for harnesses and tests
#[derive(Debug, Clone)]
pub struct StaticRoundFeed {
    round: RoundData,
    decimals: u8,
}

impl StaticRoundFeed {
    /// Feed reporting `answer` (in `decimals`) recorded at `updated_at`
    pub fn new(answer: i128, decimals: u8, updated_at: u64) -> Self {
        Self {
            round: RoundData {
                round_id: 1,
                answer,
                updated_at,
                answered_in_round: 1,
            },
            decimals,
        }
    }

    /// Replace the reported round wholesale
    pub fn set_round(&mut self, round: RoundData) {
        self.round = round;
    }

    /// Advance to a new round with a fresh answer
    pub fn set_answer(&mut self, answer: i128, updated_at: u64) {
        self.round.round_id += 1;
        self.round.answered_in_round = self.round.round_id;
        self.round.answer = answer;
        self.round.updated_at = updated_at;
    }
}

impl RoundFeed for StaticRoundFeed {
    fn latest_round(&self) -> Result<RoundData> {
        Ok(self.round)
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIVENESS FEED
// ═══════════════════════════════════════════════════════════════════════════════

/// Reported state of the host execution environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessData {
    /// Whether the environment is currently up
    pub is_up: bool,
    /// Timestamp the current status began at
    pub since: u64,
}

/// Binary liveness feed for the host execution environment.
///
/// Consulted before any price read: acting on finality that may be rolled
/// back is worse than refusing to act.
pub trait LivenessFeed {
    /// Latest reported status
    fn latest(&self) -> Result<LivenessData>;
}

/// Fixed-status liveness feed for harnesses and tests
#[derive(Debug, Clone)]
pub struct StaticLivenessFeed {
    data: LivenessData,
}

impl StaticLivenessFeed {
    /// Feed reporting `is_up` since `since`
    pub fn new(is_up: bool, since: u64) -> Self {
        Self {
            data: LivenessData { is_up, since },
        }
    }

    /// Flip the reported status
    pub fn set_status(&mut self, is_up: bool, since: u64) {
        self.data = LivenessData { is_up, since };
    }
}

impl LivenessFeed for StaticLivenessFeed {
    fn latest(&self) -> Result<LivenessData> {
        Ok(self.data)
    }
}
