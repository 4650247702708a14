//! Installer allocation, competitive bidding, and milestone escrow for
//! rainwater-harvesting installation jobs.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
