// Public modules
pub mod api;
pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod properties;
pub mod reconcile;
pub mod request;
pub mod sse;
pub mod store;
pub mod types;

// Re-exports
pub use api::ApiKind;
pub use client::OpenAi;
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
