//! Fallback time-weighted average price from cumulative tick observations.
//!
//! The fallback source exposes cumulative ticks: the arithmetic mean tick
//! over a window is the geometric mean of the instantaneous price, recovered
//! as `1.0001^avg_tick` and normalized for the two tokens' decimals. The
//! fallback pool is assumed to quote against a USD-stable token, so the
//! normalized output is a WAD USD price.

use crate::error::{Error, Result};
use crate::utils::math::{mul_div, pow10, tick_to_price_wad, Rounding};
use crate::utils::validation::validate_duration;

// ═══════════════════════════════════════════════════════════════════════════════
// TICK SOURCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Fallback cumulative-tick observation source
pub trait TickSource {
    /// Cumulative ticks at `[seconds_ago[0], seconds_ago[1]]` before now;
    /// the first entry is the older observation
    fn tick_cumulatives(&self, seconds_ago: [u64; 2]) -> Result<[i64; 2]>;

    /// Decimals of the base token (the one being priced)
    fn base_decimals(&self) -> u8;

    /// Decimals of the quote token
    fn quote_decimals(&self) -> u8;
}

/// Constant-tick source for harnesses and tests
#[derive(Debug, Clone)]
pub struct StaticTickSource {
    tick: i64,
    base_decimals: u8,
    quote_decimals: u8,
}

impl StaticTickSource {
    /// Source holding a constant instantaneous tick
    pub fn new(tick: i64, base_decimals: u8, quote_decimals: u8) -> Self {
        Self {
            tick,
            base_decimals,
            quote_decimals,
        }
    }

    /// Change the instantaneous tick
    pub fn set_tick(&mut self, tick: i64) {
        self.tick = tick;
    }
}

impl TickSource for StaticTickSource {
    fn tick_cumulatives(&self, seconds_ago: [u64; 2]) -> Result<[i64; 2]> {
        // A constant tick accumulates linearly; the absolute origin cancels
        // out of the caller's subtraction
        let at = |ago: u64| -> Result<i64> {
            self.tick
                .checked_mul(ago as i64)
                .map(|v| -v)
                .ok_or_else(|| Error::Overflow {
                    operation: "tick cumulative".into(),
                })
        };
        Ok([at(seconds_ago[0])?, at(seconds_ago[1])?])
    }

    fn base_decimals(&self) -> u8 {
        self.base_decimals
    }

    fn quote_decimals(&self) -> u8 {
        self.quote_decimals
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TWAP SYNTHESIS
// ═══════════════════════════════════════════════════════════════════════════════

/// Synthesizes the geometric-mean price over `window` seconds, WAD-scaled and
/// decimal-normalized.
///
/// `invert` flips the token ordering: the priced token is the pool's quote
/// token rather than its base token.
pub fn consult(source: &dyn TickSource, window: u64, invert: bool) -> Result<u128> {
    validate_duration(window, "twap_window")?;

    let [older, newer] = source.tick_cumulatives([window, 0])?;
    let delta = newer.checked_sub(older).ok_or_else(|| Error::Overflow {
        operation: "tick delta".into(),
    })?;

    // Floor toward negative infinity, matching cumulative-tick convention
    let span = window as i64;
    let mut avg_tick = delta / span;
    if delta < 0 && delta % span != 0 {
        avg_tick -= 1;
    }

    let (tick, base_dec, quote_dec) = if invert {
        (-avg_tick, source.quote_decimals(), source.base_decimals())
    } else {
        (avg_tick, source.base_decimals(), source.quote_decimals())
    };

    let raw = tick_to_price_wad(tick)?;
    mul_div(raw, pow10(base_dec), pow10(quote_dec), Rounding::Down)
}
