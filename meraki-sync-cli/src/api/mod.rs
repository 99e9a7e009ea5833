//! Meraki dashboard API access
//!
//! A thin reqwest executor, the retrying rate-limited transport in front of
//! it, and read-only discovery helpers built on top.

pub mod client;
pub mod discovery;
pub mod request;
pub mod resilience;
pub mod transport;
