//! Trading core for an autonomous prediction-market agent
//!
//! Discovers mispriced binary-outcome markets, sizes and signs orders
//! against the exchange protocol, and tracks the resulting positions
//! under portfolio-level risk limits.
//!
//! ## Architecture
//!
//! ```text
//! Scanner ──> Opportunity ──> Order Engine ──> Position Manager ──> Repository
//!    │                            │  │
//!    └── Discovery API            │  └── Credential Manager (L1/L2 auth)
//!                                 └── Execution API
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod order;
pub mod position;
pub mod scanner;
pub mod testing;
pub mod types;
pub mod utils;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod integration_tests;

pub use error::{AgentError, Result};
