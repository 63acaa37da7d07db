//! hcloud-gateway — cloud server gateway.
//!
//! [`ServerGateway`] wraps a [`ComputeApi`] client and exposes the server
//! operations the autoscaler core needs: label-filtered listing, lookup by
//! id or name, deletion and creation. Each call honours a [`CallContext`]
//! (cancellation + deadline) and failures carry the operation and target.

pub mod api;
pub mod context;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod types;

pub use api::{ApiError, ApiFuture, ComputeApi};
pub use context::CallContext;
pub use error::{GatewayError, GatewayResult};
pub use gateway::ServerGateway;
pub use memory::InMemoryComputeApi;
pub use types::{
    DEFAULT_PAGE_SIZE, ListOpts, NODE_GROUP_LABEL, Operation, PROVIDER_ID_PREFIX, RemoteServer,
    ServerCreateOpts, ServerPage, ServerStatus, is_selector_value,
};
