//! API clients: wallet signing, credential lifecycle, discovery,
//! execution, and public position data

pub mod auth;
pub mod clob;
pub mod credentials;
pub mod data;
pub mod gamma;

pub use auth::{OrderSigningData, Venue, WalletSigner};
pub use clob::ExecutionClient;
pub use credentials::{ApiCredentials, CredentialManager};
pub use data::PositionsClient;
pub use gamma::{DiscoveryClient, MarketFilters};
