//! Price resolution: primary round-based feeds, fallback tick TWAPs, and the
//! dual-source router that arbitrates between them.

pub mod feed;
pub mod router;
pub mod twap;
