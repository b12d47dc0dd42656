//! Photo sheet domain library.
//!
//! Pure image transforms (normalize, standardize, compose, export), the
//! layout value object, and the rate-limit admission primitives shared by
//! the API server and the counter-store backends.

pub mod admission;
pub mod counter_store;
pub mod error;
pub mod export;
pub mod layout;
pub mod normalize;
pub mod rate_limit;
pub mod sheet;
pub mod standardize;
pub mod types;
