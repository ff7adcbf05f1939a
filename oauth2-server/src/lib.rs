//! # oauth2-server
//!
//! An OAuth2 authorization server for the `authorization_code` grant, with a
//! Portable Contacts resource API gated by the issued tokens.
//!
//! ## Features
//!
//! - **Authorization endpoint**: request validation, login form, single-use grants
//! - **Token endpoint**: client authentication by parameter or `Basic` header,
//!   grant redemption with expiry and redirect URI binding
//! - **Resource API**: `@me/@self`, `@me/@all` with `equals` filtering
//! - **Pluggable Storage**: async traits for clients, grants, tokens, users, contacts
//!
//! Implicit (`token`) and hybrid (`code_and_token`) response types are
//! recognized and refused with 501; other grant types are rejected.
//!
//! ## Example
//!
//! ```rust,no_run
//! use oauth2_server::{MemoryStore, OAuth2Server, ServerConfig};
//! use std::sync::Arc;
//!
//! # fn example() -> oauth2_server::Result<()> {
//! let server = OAuth2Server::builder()
//!     .config(ServerConfig::new())
//!     .store(Arc::new(MemoryStore::new()))
//!     .build()?;
//!
//! let app = server.router();
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod authorize;
pub mod config;
pub mod contacts;
pub mod error;
pub mod grant;
pub mod memory;
pub mod params;
pub mod password;
#[cfg(feature = "axum")]
pub mod server;
pub mod store;
pub mod token;

pub use config::ServerConfig;
pub use error::{Error, OAuthErrorCode, Result};
pub use memory::MemoryStore;
#[cfg(feature = "axum")]
pub use server::{OAuth2Server, OAuth2ServerBuilder};
pub use store::{
    AccessToken, Backend, Client, ClientRegistry, ContactDirectory, Grant, GrantStore, TokenStore,
    User, UserStore,
};
