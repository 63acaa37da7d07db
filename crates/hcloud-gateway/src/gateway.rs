//! `ServerGateway`: the only path from the autoscaler core to servers.
//!
//! Every operation is a fresh remote call; nothing is cached, so every
//! answer reflects the API at call time.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::api::{ApiError, ApiFuture, ComputeApi};
use crate::context::{CallContext, Interrupt};
use crate::error::{GatewayError, GatewayResult};
use crate::types::{
    DEFAULT_PAGE_SIZE, ListOpts, NODE_GROUP_LABEL, Operation, RemoteServer, ServerCreateOpts,
    is_selector_value,
};

/// Server operations over a shared compute API client.
#[derive(Clone)]
pub struct ServerGateway {
    api: Arc<dyn ComputeApi>,
    page_size: u32,
}

impl fmt::Debug for ServerGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerGateway")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl ServerGateway {
    pub fn new(api: Arc<dyn ComputeApi>) -> Self {
        Self {
            api,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the listing page size (minimum 1).
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// All servers labelled `hcloud/node-group=<group_id>`, every page.
    /// A `group_id` that would add selector terms is rejected unsent.
    pub async fn list_by_group_label(
        &self,
        ctx: &CallContext,
        group_id: &str,
    ) -> GatewayResult<Vec<RemoteServer>> {
        if !is_selector_value(group_id) {
            return Err(GatewayError::InvalidTarget {
                operation: Operation::List,
                target: group_id.to_string(),
                reason: "not a valid label value",
            });
        }
        let selector = format!("{NODE_GROUP_LABEL}={group_id}");
        let mut servers = Vec::new();
        let mut page = 1;
        loop {
            let opts = ListOpts {
                label_selector: Some(selector.clone()),
                page,
                per_page: self.page_size,
            };
            let result = self
                .call(ctx, Operation::List, group_id, self.api.list_servers(&opts))
                .await?;
            servers.extend(result.servers);
            match result.next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        debug!(group = %group_id, count = servers.len(), "listed group servers");
        Ok(servers)
    }

    /// Fetch a server by identifier. A decimal identifier is looked up as
    /// an id, anything else as a name.
    pub async fn get_by_id_or_name(
        &self,
        ctx: &CallContext,
        ident: &str,
    ) -> GatewayResult<RemoteServer> {
        let lookup = match ident.parse::<u64>() {
            Ok(id) => {
                self.call(ctx, Operation::Get, ident, self.api.get_server_by_id(id))
                    .await
            }
            Err(_) => {
                self.call(ctx, Operation::Get, ident, self.api.get_server_by_name(ident))
                    .await
            }
        };
        let found = match lookup {
            Err(GatewayError::Transport {
                source: ApiError::NotFound,
                ..
            }) => None,
            other => other?,
        };
        found.ok_or_else(|| GatewayError::NotFound {
            operation: Operation::Get,
            target: ident.to_string(),
        })
    }

    /// Delete `server`. A server that no longer exists is reported as a
    /// transport failure like any other rejected delete.
    pub async fn delete_server(&self, ctx: &CallContext, server: &RemoteServer) -> GatewayResult<()> {
        let target = server.id.to_string();
        self.call(ctx, Operation::Delete, &target, self.api.delete_server(server.id))
            .await?;
        info!(server_id = server.id, name = %server.name, "deleted server");
        Ok(())
    }

    /// Provision a server.
    pub async fn create_server(
        &self,
        ctx: &CallContext,
        opts: &ServerCreateOpts,
    ) -> GatewayResult<RemoteServer> {
        let server = self
            .call(ctx, Operation::Create, &opts.name, self.api.create_server(opts))
            .await?;
        info!(
            server_id = server.id,
            name = %server.name,
            server_type = %server.server_type,
            location = %server.location,
            "created server"
        );
        Ok(server)
    }

    async fn call<T>(
        &self,
        ctx: &CallContext,
        operation: Operation,
        target: &str,
        fut: ApiFuture<'_, T>,
    ) -> GatewayResult<T> {
        debug!(%operation, %target, "compute API call");
        match ctx.run(fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(GatewayError::Transport {
                operation,
                target: target.to_string(),
                source,
            }),
            Err(Interrupt::Cancelled) => Err(GatewayError::Cancelled {
                operation,
                target: target.to_string(),
            }),
            Err(Interrupt::DeadlineExceeded) => Err(GatewayError::DeadlineExceeded {
                operation,
                target: target.to_string(),
            }),
        }
    }
}
