//! REST adapter implementing the sync pipeline's `RemoteStore` seam.

pub mod client;
pub mod config;
pub mod error;

pub use client::RestRemoteStore;
pub use config::RemoteConfig;
pub use error::{ApiRetryClass, RemoteError};
