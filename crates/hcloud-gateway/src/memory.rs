//! In-memory [`ComputeApi`] for tests and local runs.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::future::pending;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::api::{ApiError, ApiFuture, ComputeApi};
use crate::types::{ListOpts, Operation, RemoteServer, ServerCreateOpts, ServerPage, ServerStatus};

/// A fake compute API holding servers in a map.
///
/// Counts calls per operation, and can be told to fail the next call of an
/// operation or to stall it forever.
#[derive(Debug, Default)]
pub struct InMemoryComputeApi {
    state: Mutex<State>,
    calls: CallCounters,
}

#[derive(Debug, Default)]
struct State {
    servers: BTreeMap<u64, RemoteServer>,
    next_id: u64,
    failures: HashMap<Operation, VecDeque<ApiError>>,
    stalled: HashSet<Operation>,
}

#[derive(Debug, Default)]
struct CallCounters {
    list: AtomicUsize,
    get: AtomicUsize,
    delete: AtomicUsize,
    create: AtomicUsize,
}

impl CallCounters {
    fn counter(&self, op: Operation) -> &AtomicUsize {
        match op {
            Operation::List => &self.list,
            Operation::Get => &self.get,
            Operation::Delete => &self.delete,
            Operation::Create => &self.create,
        }
    }
}

impl InMemoryComputeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the fake with `servers`. Created servers get ids above the
    /// highest seeded id.
    pub fn with_servers(servers: impl IntoIterator<Item = RemoteServer>) -> Self {
        let api = Self::new();
        for server in servers {
            api.insert(server);
        }
        api
    }

    /// Add or replace a server.
    pub fn insert(&self, server: RemoteServer) {
        let mut state = self.lock();
        state.next_id = state.next_id.max(server.id);
        state.servers.insert(server.id, server);
    }

    /// Snapshot of every stored server, ordered by id.
    pub fn servers(&self) -> Vec<RemoteServer> {
        self.lock().servers.values().cloned().collect()
    }

    /// Fail the next call of `op` with `err`. Queued failures are used in
    /// order.
    pub fn fail_next(&self, op: Operation, err: ApiError) {
        self.lock().failures.entry(op).or_default().push_back(err);
    }

    /// Make every subsequent call of `op` hang forever.
    pub fn stall(&self, op: Operation) {
        self.lock().stalled.insert(op);
    }

    /// Number of calls made for `op`.
    pub fn calls(&self, op: Operation) -> usize {
        self.calls.counter(op).load(Ordering::SeqCst)
    }

    /// Number of calls made across all operations.
    pub fn total_calls(&self) -> usize {
        [
            Operation::List,
            Operation::Get,
            Operation::Delete,
            Operation::Create,
        ]
        .into_iter()
        .map(|op| self.calls(op))
        .sum()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build the future for one call of `op`. Nothing happens until it is
    /// first polled: the call is counted, then a stall, a queued failure or
    /// `f` applied to the state decides the outcome.
    fn handle<'a, T, F>(&'a self, op: Operation, f: F) -> ApiFuture<'a, T>
    where
        T: Send + 'a,
        F: FnOnce(&mut State) -> Result<T, ApiError> + Send + 'a,
    {
        Box::pin(async move {
            self.calls.counter(op).fetch_add(1, Ordering::SeqCst);
            let outcome = {
                let mut state = self.lock();
                if state.stalled.contains(&op) {
                    None
                } else if let Some(err) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
                    Some(Err(err))
                } else {
                    Some(f(&mut state))
                }
            };
            match outcome {
                Some(result) => result,
                None => pending().await,
            }
        })
    }
}

fn matches_selector(server: &RemoteServer, selector: Option<&str>) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => server.labels.get(key).is_some_and(|v| v == value),
            None => server.labels.contains_key(term),
        })
}

impl ComputeApi for InMemoryComputeApi {
    fn list_servers<'a>(&'a self, opts: &'a ListOpts) -> ApiFuture<'a, ServerPage> {
        self.handle(Operation::List, move |state| {
            let matching: Vec<_> = state
                .servers
                .values()
                .filter(|s| matches_selector(s, opts.label_selector.as_deref()))
                .cloned()
                .collect();
            let per_page = opts.per_page.max(1) as usize;
            let start = (opts.page.max(1) as usize - 1) * per_page;
            let servers: Vec<_> = matching.iter().skip(start).take(per_page).cloned().collect();
            let next_page = (start + per_page < matching.len()).then_some(opts.page.max(1) + 1);
            Ok(ServerPage { servers, next_page })
        })
    }

    fn get_server_by_id(&self, id: u64) -> ApiFuture<'_, Option<RemoteServer>> {
        self.handle(Operation::Get, move |state| Ok(state.servers.get(&id).cloned()))
    }

    fn get_server_by_name<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<RemoteServer>> {
        self.handle(Operation::Get, move |state| {
            Ok(state.servers.values().find(|s| s.name == name).cloned())
        })
    }

    fn delete_server(&self, id: u64) -> ApiFuture<'_, ()> {
        self.handle(Operation::Delete, move |state| {
            state.servers.remove(&id).map(|_| ()).ok_or(ApiError::NotFound)
        })
    }

    fn create_server<'a>(&'a self, opts: &'a ServerCreateOpts) -> ApiFuture<'a, RemoteServer> {
        self.handle(Operation::Create, move |state| {
            if state.servers.values().any(|s| s.name == opts.name) {
                return Err(ApiError::Status {
                    code: 409,
                    message: format!("server name {} is already used", opts.name),
                });
            }
            state.next_id += 1;
            let server = RemoteServer {
                id: state.next_id,
                name: opts.name.clone(),
                status: ServerStatus::Initializing,
                server_type: opts.server_type.clone(),
                location: opts.location.clone(),
                labels: opts.labels.clone(),
            };
            state.servers.insert(server.id, server.clone());
            Ok(server)
        })
    }
}
