//! Nebraska Provider
//!
//! An infrastructure-as-code provider for the
//! [Nebraska](https://github.com/kinvolk/nebraska) update manager. It manages
//! applications, channels, groups and packages on a Nebraska server and
//! exposes each of them as a data source as well.
//!
//! # Overview
//!
//! - **Configuration**: endpoint, auth mode and credentials, with environment
//!   variable fallbacks ([`config`])
//! - **Authentication**: `noop`, `github` and `oidc` sessions ([`auth`])
//! - **API**: the [`NebraskaApi`] trait and its reqwest client ([`api`])
//! - **Resources**: typed state, schemas and CRUD per entity ([`resources`])
//! - **Provider surface**: [`ProviderService`] implemented by [`NebraskaProvider`]
//! - **Logging**: integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use nebraska_provider::{init_logging, NebraskaProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = NebraskaProvider::new();
//!     provider
//!         .configure(json!({
//!             "endpoint": "https://nebraska.example.com",
//!             "auth_mode": "github",
//!         }))
//!         .await?;
//!
//!     let channel = provider
//!         .create("nebraska_channel", json!({
//!             "application_id": "e96281a6-d1af-4bde-9a0a-97b76e56dc57",
//!             "name": "stable",
//!             "arch": "amd64",
//!         }))
//!         .await?;
//!     println!("created channel {}", channel["id"]);
//!     Ok(())
//! }
//! ```
//!
//! # Environment
//!
//! Attributes absent from the provider block are read from
//! `NEBRASKA_ENDPOINT`, `NEBRASKA_AUTH_MODE`, `NEBRASKA_GH_TOKEN`,
//! `NEBRASKA_USERNAME` and `NEBRASKA_PASSWORD`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod nua;
pub mod pagination;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use api::NebraskaApi;
pub use auth::{configure_session, Session};
pub use config::ProviderConfig;
pub use error::{ProviderError, ProviderResult};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{Connect, HttpConnector, NebraskaProvider, ProviderService};
pub use schema::ProviderSchema;
pub use types::{Arch, AuthMode, PackageType, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
