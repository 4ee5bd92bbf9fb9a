// ecolearn-api: Async Rust client for the EcoLearn admin asset endpoints

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::AssetClient;
pub use error::Error;
pub use models::{AssetCountsResponse, CardUpload, Endpoint, OneShotResponse};
pub use transport::{TlsMode, TransportConfig};
