//! Response cache for fetched assistance data
//!
//! This module persists the most recent service response to disk together
//! with the fingerprint of the parameters that produced it and the fetch
//! timestamp. The validity evaluator decides per invocation whether the
//! cached payload may be reused or a fresh fetch is required.

mod manager;
mod validity;

pub use manager::{CacheEntry, CacheStore};
pub use validity::{evaluate, Decision};
