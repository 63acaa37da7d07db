//! The compute API client seam.
//!
//! [`ComputeApi`] is the black-box RPC client the gateway drives. Transport
//! concerns (HTTP, auth headers, retry, rate-limit backoff) live behind it.
//! Methods return boxed futures so the trait stays object-safe and clients
//! can be swapped at runtime (`Arc<dyn ComputeApi>`).

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::types::{ListOpts, RemoteServer, ServerCreateOpts, ServerPage};

/// Boxed future returned by [`ComputeApi`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Failures reported by a compute API client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("resource not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("API returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    /// Client-specific failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Remote compute API operations used by the gateway.
pub trait ComputeApi: Send + Sync {
    /// Fetch one page of servers.
    fn list_servers<'a>(&'a self, opts: &'a ListOpts) -> ApiFuture<'a, ServerPage>;

    /// Fetch a server by id. `Ok(None)` when it does not exist.
    fn get_server_by_id(&self, id: u64) -> ApiFuture<'_, Option<RemoteServer>>;

    /// Fetch a server by name. `Ok(None)` when it does not exist.
    fn get_server_by_name<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<RemoteServer>>;

    /// Delete a server by id.
    fn delete_server(&self, id: u64) -> ApiFuture<'_, ()>;

    /// Provision a new server.
    fn create_server<'a>(&'a self, opts: &'a ServerCreateOpts) -> ApiFuture<'a, RemoteServer>;
}
