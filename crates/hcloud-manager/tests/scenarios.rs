//! End-to-end behaviour of the manager over the in-memory compute API.

use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::time::Duration;

use hcloud_gateway::{
    ApiError, GatewayError, NODE_GROUP_LABEL, Operation, RemoteServer, ServerStatus,
};
use hcloud_manager::config::{CLOUD_INIT_KEY, NAME_TEMPLATE_KEY, TOKEN_KEY};
use hcloud_manager::{
    CallContext, ClusterNode, ComputeApi, ConfigError, DRAINING_GROUP_ID, GroupKind,
    InMemoryComputeApi, Manager, ManagerConfig, ManagerError,
};
use hcloud_naming::{NameContext, NameTemplate};
use hcloud_nodegroup::{NodeGroupError, NodeGroupSpec};
use tokio::sync::watch;

static TRACING_INIT: Once = Once::new();

/// Controlled by `RUST_LOG` (e.g. `RUST_LOG=debug`).
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

// ── Helpers ──────────────────────────────────────────────────────

fn server(id: u64, name: &str, group: &str) -> RemoteServer {
    RemoteServer {
        id,
        name: name.to_string(),
        status: ServerStatus::Running,
        server_type: "cx21".to_string(),
        location: "nbg1".to_string(),
        labels: HashMap::from([(NODE_GROUP_LABEL.to_string(), group.to_string())]),
    }
}

fn base_config() -> ManagerConfig {
    ManagerConfig::new("t1", "aGVsbG8=")
}

fn manager_over(api: &Arc<InMemoryComputeApi>, config: ManagerConfig) -> Manager {
    init_tracing();
    let api = api.clone();
    Manager::new(config, move |_| api as Arc<dyn ComputeApi>).unwrap()
}

fn ctx() -> CallContext {
    CallContext::background()
}

// ── Construction ─────────────────────────────────────────────────

#[test]
fn minimal_config_yields_only_the_draining_pool() {
    let api = Arc::new(InMemoryComputeApi::new());
    let manager = manager_over(&api, base_config());

    let groups = manager.node_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].id, DRAINING_GROUP_ID);
    assert_eq!(groups[0].kind, GroupKind::Draining);
    assert_eq!(groups[0].server_type, "cx11");
    assert_eq!(groups[0].region, "fsn1");
    assert_eq!(groups[0].target_size, 0);
    assert_eq!(manager.cloud_init(), "hello");
    assert_eq!(manager.image(), "ubuntu-20.04");
    assert!(manager.ssh_keys().is_empty());
    assert!(manager.name_template().is_none());
    assert_eq!(api.total_calls(), 0);
}

#[test]
fn empty_token_fails_construction() {
    let err = Manager::new(ManagerConfig::new("", "aGVsbG8="), |_| {
        Arc::new(InMemoryComputeApi::new()) as Arc<dyn ComputeApi>
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::Missing(TOKEN_KEY)));
    assert!(err.to_string().contains("HCLOUD_TOKEN"));
}

#[test]
fn empty_cloud_init_fails_construction() {
    let err = Manager::new(ManagerConfig::new("t1", ""), |_| {
        Arc::new(InMemoryComputeApi::new()) as Arc<dyn ComputeApi>
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::Missing(CLOUD_INIT_KEY)));
}

#[test]
fn invalid_base64_fails_construction() {
    let err = Manager::new(ManagerConfig::new("t1", "not base64!"), |_| {
        Arc::new(InMemoryComputeApi::new()) as Arc<dyn ComputeApi>
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBase64 { .. }));
    assert!(err.to_string().contains("HCLOUD_CLOUD_INIT"));
}

#[test]
fn bad_template_fails_construction() {
    let config = base_config().with_name_template("{{ .GroupId ");
    let err = Manager::new(config, |_| {
        Arc::new(InMemoryComputeApi::new()) as Arc<dyn ComputeApi>
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::Template { .. }));
    assert!(err.to_string().contains(NAME_TEMPLATE_KEY));
}

#[test]
fn unknown_template_function_fails_construction() {
    let config = base_config().with_name_template("{{ exec .GroupId }}");
    let err = Manager::new(config, |_| {
        Arc::new(InMemoryComputeApi::new()) as Arc<dyn ComputeApi>
    })
    .unwrap_err();
    assert!(matches!(err, ConfigError::Template { .. }));
}

#[test]
fn duplicate_node_groups_fail_construction() {
    let config = base_config()
        .with_node_group(NodeGroupSpec::new("pool1", "cx21", "nbg1", 0, 3))
        .with_node_group(NodeGroupSpec::new("pool1", "cx31", "fsn1", 0, 3));
    let err = Manager::new(config, |_| {
        Arc::new(InMemoryComputeApi::new()) as Arc<dyn ComputeApi>
    })
    .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::NodeGroup {
            source: NodeGroupError::DuplicateGroup(_),
            ..
        }
    ));
}

#[test]
fn config_from_lookup_builds_a_manager() {
    let vars = HashMap::from([
        ("HCLOUD_TOKEN", "t1"),
        ("HCLOUD_CLOUD_INIT", "aGVsbG8="),
        ("HCLOUD_SSH_KEY", "ops,ci"),
        ("HCLOUD_NODE_GROUPS", "1:3:cx21:nbg1:pool1"),
    ]);
    let config =
        ManagerConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
    let api = Arc::new(InMemoryComputeApi::new());
    let manager = manager_over(&api, config);

    assert_eq!(manager.ssh_keys(), ["ops".to_string(), "ci".to_string()]);
    let pool1 = manager.node_group("pool1").unwrap();
    assert_eq!(pool1.kind, GroupKind::Ordinary);
    assert_eq!((pool1.min_size, pool1.max_size, pool1.target_size), (1, 3, 1));
}

// ── Draining ─────────────────────────────────────────────────────

#[test]
fn draining_three_nodes_counts_three_without_remote_calls() {
    let api = Arc::new(InMemoryComputeApi::new());
    let manager = manager_over(&api, base_config());

    let node = ClusterNode::new("worker-1").with_provider_id("hcloud://1");
    let mut last = None;
    for _ in 0..3 {
        last = Some(manager.add_node_to_draining_pool(&node));
    }

    assert_eq!(last.map(|d| d.target_size), Some(3));
    assert_eq!(manager.node_group(DRAINING_GROUP_ID).unwrap().target_size, 3);
    assert_eq!(api.total_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_draining_never_loses_a_count() {
    let api = Arc::new(InMemoryComputeApi::new());
    let manager = Arc::new(manager_over(&api, base_config()));

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager.add_node_to_draining_pool(&ClusterNode::new(format!("worker-{i}")));
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(manager.node_group(DRAINING_GROUP_ID).unwrap().target_size, 64);
}

// ── Resolution and deletion ──────────────────────────────────────

#[tokio::test]
async fn missing_server_is_node_not_found_and_nothing_is_deleted() {
    let api = Arc::new(InMemoryComputeApi::new());
    let manager = manager_over(&api, base_config());
    let node = ClusterNode::new("worker-1").with_provider_id("hcloud://4242");

    let err = manager.server_for_node(&ctx(), &node).await.unwrap_err();
    assert!(err.is_node_not_found());

    let err = manager.delete_by_node(&ctx(), &node).await.unwrap_err();
    assert!(err.is_node_not_found());
    assert_eq!(api.calls(Operation::Delete), 0);
}

#[tokio::test]
async fn provider_id_takes_precedence_over_name() {
    let api = Arc::new(InMemoryComputeApi::with_servers([
        server(10, "worker-1", "pool1"),
        server(20, "worker-2", "pool1"),
    ]));
    let manager = manager_over(&api, base_config());
    let node = ClusterNode::new("worker-1").with_provider_id("hcloud://20");

    let found = manager.server_for_node(&ctx(), &node).await.unwrap();
    assert_eq!(found.id, 20);
}

#[tokio::test]
async fn name_is_used_when_provider_id_is_empty() {
    let api = Arc::new(InMemoryComputeApi::with_servers([server(10, "worker-1", "pool1")]));
    let manager = manager_over(&api, base_config());
    let node = ClusterNode::new("worker-1").with_provider_id("");

    let found = manager.server_for_node(&ctx(), &node).await.unwrap();
    assert_eq!(found.id, 10);
}

#[tokio::test]
async fn delete_by_node_removes_the_server() {
    let api = Arc::new(InMemoryComputeApi::with_servers([server(10, "worker-1", "pool1")]));
    let manager = manager_over(&api, base_config());

    manager
        .delete_by_node(&ctx(), &ClusterNode::new("worker-1").with_provider_id("hcloud://10"))
        .await
        .unwrap();
    assert!(api.servers().is_empty());
}

#[tokio::test]
async fn transport_failures_are_returned_with_context() {
    let api = Arc::new(InMemoryComputeApi::new());
    api.fail_next(Operation::Get, ApiError::Unauthorized);
    let manager = manager_over(&api, base_config());

    let err = manager
        .server_for_node(&ctx(), &ClusterNode::new("worker-1"))
        .await
        .unwrap_err();
    match err {
        ManagerError::NodeGroup(NodeGroupError::ResolutionFailed { node, source }) => {
            assert_eq!(node, "worker-1");
            assert_eq!(source.operation(), Operation::Get);
            assert_eq!(source.target(), "worker-1");
            assert!(matches!(
                source,
                GatewayError::Transport {
                    source: ApiError::Unauthorized,
                    ..
                }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn cancellation_reaches_the_gateway() {
    let api = Arc::new(InMemoryComputeApi::with_servers([server(10, "worker-1", "pool1")]));
    let manager = manager_over(&api, base_config());
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let ctx = CallContext::background().with_cancel(rx);

    let err = manager
        .delete_by_node(&ctx, &ClusterNode::new("worker-1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ManagerError::NodeGroup(NodeGroupError::ResolutionFailed {
            source: GatewayError::Cancelled { .. },
            ..
        })
    ));
    assert_eq!(api.servers().len(), 1);
    assert_eq!(api.total_calls(), 0);
}

#[tokio::test]
async fn deadline_bounds_a_stalled_listing() {
    let api = Arc::new(InMemoryComputeApi::new());
    api.stall(Operation::List);
    let manager = manager_over(
        &api,
        base_config().with_node_group(NodeGroupSpec::new("pool1", "cx21", "nbg1", 0, 3)),
    );
    let ctx = CallContext::background().with_timeout(Duration::from_millis(25));

    let err = manager.all_servers(&ctx, "pool1").await.unwrap_err();
    assert!(matches!(
        err,
        ManagerError::NodeGroup(NodeGroupError::Gateway(
            GatewayError::DeadlineExceeded { .. }
        ))
    ));
}

// ── Listing and scaling ──────────────────────────────────────────

#[tokio::test]
async fn all_servers_lists_by_group_label() {
    let api = Arc::new(InMemoryComputeApi::with_servers([
        server(1, "pool1-a", "pool1"),
        server(2, "pool2-a", "pool2"),
        server(3, "pool1-b", "pool1"),
    ]));
    let manager = manager_over(
        &api,
        base_config().with_node_group(NodeGroupSpec::new("pool1", "cx21", "nbg1", 0, 3)),
    );

    let servers = manager.all_servers(&ctx(), "pool1").await.unwrap();
    let mut ids: Vec<_> = servers.iter().map(|s| s.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 3]);

    let err = manager.all_servers(&ctx(), "pool9").await.unwrap_err();
    assert!(matches!(
        err,
        ManagerError::NodeGroup(NodeGroupError::UnknownGroup(_))
    ));
}

#[tokio::test]
async fn scale_up_then_down_round_trip() {
    let api = Arc::new(InMemoryComputeApi::new());
    let manager = manager_over(
        &api,
        base_config()
            .with_name_template("{{toUpper .GroupId}}-{{.Seq}}")
            .with_node_group(NodeGroupSpec::new("pool1", "cx21", "nbg1", 0, 3)),
    );

    let created = manager.increase_size(&ctx(), "pool1", 3).await.unwrap();
    let names: Vec<_> = created.iter().map(|s| s.name.clone()).collect();
    assert_eq!(names, vec!["POOL1-0", "POOL1-1", "POOL1-2"]);
    assert_eq!(manager.node_group("pool1").unwrap().target_size, 3);

    let err = manager.increase_size(&ctx(), "pool1", 1).await.unwrap_err();
    assert!(matches!(
        err,
        ManagerError::NodeGroup(NodeGroupError::SizeOutOfBounds { .. })
    ));

    let listed = manager.all_servers(&ctx(), "pool1").await.unwrap();
    assert_eq!(listed.len(), 3);

    let nodes: Vec<_> = created
        .iter()
        .take(2)
        .map(|s| ClusterNode::new(s.name.clone()).with_provider_id(s.provider_id()))
        .collect();
    manager.delete_nodes(&ctx(), "pool1", &nodes).await.unwrap();
    assert_eq!(manager.node_group("pool1").unwrap().target_size, 1);
    assert_eq!(api.servers().len(), 1);

    let snapshot = manager.decrease_target_size("pool1", 1).unwrap();
    assert_eq!(snapshot.target_size, 0);
}

#[test]
fn refresh_makes_no_remote_calls() {
    let api = Arc::new(InMemoryComputeApi::new());
    let manager = manager_over(&api, base_config());
    manager.refresh().unwrap();
    manager.refresh().unwrap();
    assert_eq!(api.total_calls(), 0);
}

// ── Naming ───────────────────────────────────────────────────────

#[test]
fn upper_cased_group_and_sequence() {
    let template = NameTemplate::compile("{{toUpper .GroupId}}-{{.Seq}}").unwrap();
    let name = template.render(&NameContext::new("pool1", "7")).unwrap();
    assert_eq!(name, "POOL1-7");
}
