//! Node communicator — concurrent fan-out with deterministic aggregation.
//!
//! One call sends one request to many nodes at once, capped by a semaphore,
//! with a timeout around every request and an optional deadline around the
//! whole call. The caller gets back exactly one [`RequestOutcome`] per
//! target, keyed and ordered by label, however the sends interleaved.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::debug;

use crate::reports::ForceFlags;

use super::outcome::RequestOutcome;
use super::target::Target;
use super::transport::{NodeRequest, NodeTransport};

/// How failures found during a communication step are graded: which force
/// flags are active, and whether unreachable nodes are tolerated.
#[derive(Debug, Clone, Default)]
pub struct CommunicationPolicy {
    pub forces: ForceFlags,
    pub skip_offline: bool,
}

impl CommunicationPolicy {
    pub fn new(forces: ForceFlags, skip_offline: bool) -> Self {
        Self {
            forces,
            skip_offline,
        }
    }

    /// No forces, no offline tolerance.
    pub fn strict() -> Self {
        Self::default()
    }
}

pub struct NodeCommunicator {
    transport: Arc<dyn NodeTransport>,
    request_timeout: Duration,
    parallelism: usize,
    call_timeout: Option<Duration>,
}

impl NodeCommunicator {
    pub fn new(transport: Arc<dyn NodeTransport>) -> Self {
        Self {
            transport,
            request_timeout: Duration::from_secs(30),
            parallelism: 16,
            call_timeout: None,
        }
    }

    /// Time limit for each individual request.
    pub fn request_timeout(mut self, limit: Duration) -> Self {
        self.request_timeout = limit;
        self
    }

    /// Upper bound on requests in flight at once.
    pub fn parallelism(mut self, limit: usize) -> Self {
        self.parallelism = limit.max(1);
        self
    }

    /// Optional deadline for a whole fan-out call. Requests still pending at
    /// the deadline are recorded as timed out.
    pub fn call_timeout(mut self, limit: Option<Duration>) -> Self {
        self.call_timeout = limit;
        self
    }

    /// Send one request to every target concurrently. `build` runs once per
    /// target, so payloads may differ per node.
    pub async fn run<F>(&self, targets: &[Target], build: F) -> BTreeMap<String, RequestOutcome>
    where
        F: Fn(&Target) -> NodeRequest,
    {
        let prepared: Vec<(Target, NodeRequest)> = targets
            .iter()
            .map(|target| (target.clone(), build(target)))
            .collect();
        self.run_prepared(prepared).await
    }

    pub(super) async fn run_prepared(
        &self,
        prepared: Vec<(Target, NodeRequest)>,
    ) -> BTreeMap<String, RequestOutcome> {
        let labels: Vec<String> = prepared
            .iter()
            .map(|(target, _)| target.label().to_string())
            .collect();
        debug!(nodes = prepared.len(), "fanning out node requests");

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut workers: JoinSet<(String, RequestOutcome)> = JoinSet::new();
        for (target, request) in prepared {
            let transport = Arc::clone(&self.transport);
            let gate = Arc::clone(&semaphore);
            let request_timeout = self.request_timeout;
            workers.spawn(async move {
                let label = target.label().to_string();
                // The semaphore is never closed; a failed acquire means the
                // call is being torn down, which reads as a timeout.
                let Ok(_permit) = gate.acquire_owned().await else {
                    return (label, RequestOutcome::Timeout);
                };
                let outcome =
                    match timeout(request_timeout, transport.send(&target, &request)).await {
                        Ok(outcome) => outcome,
                        Err(_) => RequestOutcome::Timeout,
                    };
                (label, outcome)
            });
        }

        let mut outcomes = BTreeMap::new();
        match self.call_timeout {
            Some(limit) => {
                let deadline = Instant::now() + limit;
                while let Ok(Some(joined)) = timeout_at(deadline, workers.join_next()).await {
                    if let Ok((label, outcome)) = joined {
                        outcomes.insert(label, outcome);
                    }
                }
                workers.abort_all();
            }
            None => {
                while let Some(joined) = workers.join_next().await {
                    if let Ok((label, outcome)) = joined {
                        outcomes.insert(label, outcome);
                    }
                }
            }
        }

        // Every target gets exactly one outcome; whatever never finished
        // (deadline hit, worker aborted) is a timeout.
        for label in labels {
            outcomes.entry(label).or_insert(RequestOutcome::Timeout);
        }
        outcomes
    }
}
