//! Typed client for the devpi package index server REST API.
//!
//! Covers user, index, project and token management, package upload, and
//! client-side token inspection. Requests are blocking and go through a
//! [`Transport`], which tests replace with a scripted double.
//!
//! # Layout
//!
//! - [`Client`] holds the base URL, credentials and transport.
//! - [`api`] has one borrowed sub-client per resource.
//! - [`models`] decodes devpi's JSON envelopes into typed values.
//! - [`config`] layers settings from TOML, `.env` files and the environment.

pub mod api;
pub mod client;
pub mod config;
pub mod distribution;
pub mod error;
pub mod macaroon;
pub mod models;
pub mod transport;
pub mod validate;
pub mod version;

#[cfg(test)]
mod testing;

// Re-exports for convenience.
pub use api::{inspect_token, validate_permissions, Auth, IndexApi, ProjectApi, TokenApi, UserApi};
pub use client::{Client, ClientBuilder, ClientOptions, DEFAULT_TIMEOUT};
pub use config::ClientConfig;
pub use error::{DevpiError, Result};
pub use models::{
    DeleteResponse, IndexConfig, IndexSpec, IndexUpdate, ProjectVersion, TokenInfo, TokenRequest,
    UploadReceipt, UserInfo, UserUpdate,
};
pub use transport::{Credentials, HttpTransport, TlsVerify, Transport};
