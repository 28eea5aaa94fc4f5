#![allow(dead_code)]
//! Shared test doubles: a scripted node transport and a scripted local
//! runner, plus builders for the environment operations run in.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use capstan::comm::{NodeCommunicator, NodeRequest, NodeTransport, RequestOutcome, Target};
use capstan::config::{Inventory, NodeEntry, QnetdEntry};
use capstan::ops::{OperationEnv, OperationOptions};
use capstan::reports::ForceCode;
use capstan::runner::{CommandOutput, CommandRunner, RunnerError};

// ── Outcome shorthands ──────────────────────────────────────────────────────

pub fn success(payload: &str) -> RequestOutcome {
    RequestOutcome::Success {
        payload: payload.to_string(),
    }
}

/// A `remote/check_auth` body from a compatible agent.
pub fn agent_ok() -> RequestOutcome {
    success(r#"{"version": "0.12.0"}"#)
}

pub fn offline() -> RequestOutcome {
    RequestOutcome::ConnectError {
        reason: "connection refused".to_string(),
    }
}

pub fn remote_error(status: u16, output: &str) -> RequestOutcome {
    RequestOutcome::RemoteError {
        status,
        output: output.to_string(),
    }
}

// ── Scripted transport ──────────────────────────────────────────────────────

/// One request the transport saw, for assertions about who was asked what.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub node: String,
    pub route: String,
    pub payload: Value,
}

/// Transport that answers from a script instead of a network.
///
/// Answer resolution, most specific first: a queued (node, route) outcome,
/// then the node's standing answer, then the route's standing answer, then
/// the transport default (success with an empty body).
pub struct ScriptedTransport {
    queued: Mutex<BTreeMap<(String, String), VecDeque<RequestOutcome>>>,
    per_node: Mutex<BTreeMap<String, RequestOutcome>>,
    per_route: Mutex<BTreeMap<String, RequestOutcome>>,
    delays: Mutex<BTreeMap<String, Duration>>,
    log: Mutex<Vec<SentRequest>>,
    inflight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queued: Mutex::new(BTreeMap::new()),
            per_node: Mutex::new(BTreeMap::new()),
            per_route: Mutex::new(BTreeMap::new()),
            delays: Mutex::new(BTreeMap::new()),
            log: Mutex::new(Vec::new()),
            inflight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    /// Queue one outcome for the next request this node gets on this route.
    pub fn answer(&self, node: &str, route: &str, outcome: RequestOutcome) {
        self.queued
            .lock()
            .unwrap()
            .entry((node.to_string(), route.to_string()))
            .or_default()
            .push_back(outcome);
    }

    /// Standing answer for every request this node gets.
    pub fn node_answers(&self, node: &str, outcome: RequestOutcome) {
        self.per_node
            .lock()
            .unwrap()
            .insert(node.to_string(), outcome);
    }

    /// The node refuses connections from here on (queued answers still win).
    pub fn node_down(&self, node: &str) {
        self.node_answers(node, offline());
    }

    /// Standing answer for this route on every node.
    pub fn route_answers(&self, route: &str, outcome: RequestOutcome) {
        self.per_route
            .lock()
            .unwrap()
            .insert(route.to_string(), outcome);
    }

    /// Every node passes the auth check as a compatible agent.
    pub fn agents_ok(&self) {
        self.route_answers("remote/check_auth", agent_ok());
    }

    /// Delay every answer from this node.
    pub fn delay(&self, node: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(node.to_string(), delay);
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.log.lock().unwrap().clone()
    }

    /// Routes this node was asked for, in arrival order.
    pub fn routes_for(&self, node: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|request| request.node == node)
            .map(|request| request.route)
            .collect()
    }

    /// Payloads sent to this node on this route, in arrival order.
    pub fn payloads_for(&self, node: &str, route: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|request| request.node == node && request.route == route)
            .map(|request| request.payload)
            .collect()
    }

    /// Most requests that were ever in flight at the same time.
    pub fn peak_inflight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn lookup(&self, node: &str, route: &str) -> RequestOutcome {
        if let Some(outcome) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&(node.to_string(), route.to_string()))
            .and_then(VecDeque::pop_front)
        {
            return outcome;
        }
        if let Some(outcome) = self.per_node.lock().unwrap().get(node) {
            return outcome.clone();
        }
        if let Some(outcome) = self.per_route.lock().unwrap().get(route) {
            return outcome.clone();
        }
        success("")
    }
}

#[async_trait]
impl NodeTransport for ScriptedTransport {
    async fn send(&self, target: &Target, request: &NodeRequest) -> RequestOutcome {
        let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        self.log.lock().unwrap().push(SentRequest {
            node: target.label().to_string(),
            route: request.route.clone(),
            payload: request.payload.clone(),
        });
        let delay = self.delays.lock().unwrap().get(target.label()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self.lookup(target.label(), &request.route);

        self.inflight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

// ── Scripted runner ─────────────────────────────────────────────────────────

pub fn ok_output(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        status: 0,
    }
}

pub fn failed_output(status: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
        status,
    }
}

/// Local runner answering from a table keyed by the joined argv. Unscripted
/// commands succeed with an empty stdout.
pub struct ScriptedRunner {
    replies: BTreeMap<String, CommandOutput>,
    calls: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            replies: BTreeMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn reply(mut self, argv: &str, stdout: &str) -> Self {
        self.replies.insert(argv.to_string(), ok_output(stdout));
        self
    }

    pub fn reply_with(mut self, argv: &str, output: CommandOutput) -> Self {
        self.replies.insert(argv.to_string(), output);
        self
    }

    /// Handle onto the call log, valid after the runner moves into the env.
    pub fn calls_handle(&self) -> Arc<Mutex<Vec<(String, Option<String>)>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, argv: &[&str], stdin: Option<&str>) -> Result<CommandOutput, RunnerError> {
        let key = argv.join(" ");
        self.calls
            .lock()
            .unwrap()
            .push((key.clone(), stdin.map(str::to_string)));
        Ok(self.replies.get(&key).cloned().unwrap_or_else(|| ok_output("")))
    }
}

// ── Environment builders ────────────────────────────────────────────────────

pub fn inventory(cluster: &str, labels: &[&str], qnetd: Option<&str>) -> Inventory {
    let nodes = labels
        .iter()
        .map(|label| {
            (
                label.to_string(),
                NodeEntry {
                    addrs: vec![format!("{label}.local")],
                    port: None,
                },
            )
        })
        .collect();
    Inventory {
        cluster_name: cluster.to_string(),
        nodes,
        qnetd: qnetd.map(|host| QnetdEntry {
            host: host.to_string(),
            port: None,
        }),
    }
}

pub fn env(
    transport: &Arc<ScriptedTransport>,
    runner: ScriptedRunner,
    inventory: Inventory,
    options: OperationOptions,
) -> OperationEnv {
    let communicator = NodeCommunicator::new(transport.clone());
    OperationEnv::new(inventory, communicator, Box::new(runner), options)
}

/// No forces, no offline tolerance.
pub fn strict() -> OperationOptions {
    OperationOptions::default()
}

/// What the CLI builds for `--skip-offline`.
pub fn skip_offline() -> OperationOptions {
    OperationOptions {
        forces: [ForceCode::SkipOffline].into_iter().collect(),
        skip_offline: true,
    }
}

/// What the CLI builds for `--force`.
pub fn forced() -> OperationOptions {
    OperationOptions {
        forces: [ForceCode::Force].into_iter().collect(),
        skip_offline: false,
    }
}
