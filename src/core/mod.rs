//! Core types: identifiers, the interest-rate model, positions, the market
//! ledger and token interfaces.

pub mod ids;
pub mod irm;
pub mod market;
pub mod pool;
pub mod position;
pub mod token;
