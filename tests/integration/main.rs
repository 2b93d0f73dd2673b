//! Integration test entry point.

mod cache_refresh;
mod conversion;
