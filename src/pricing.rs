//! Upstream pricing source client and the rate table derived from it.

pub mod client;
pub mod rates;
