//! Communication commands — one logical step against a set of nodes.
//!
//! A command owns the request shape and the interpretation of responses; the
//! communicator owns scheduling and failure classification. `execute` glues
//! them together: fan the request out, then walk the aggregated outcomes in
//! label order and grade every failure into a report item.

use std::collections::BTreeMap;

use crate::reports::{
    apply_force, ForceCode, ReportItem, ReportMessage, ReportProcessor,
};

use super::communicator::{CommunicationPolicy, NodeCommunicator};
use super::outcome::RequestOutcome;
use super::target::Target;
use super::transport::NodeRequest;

/// How much a command cares about individual node failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFailurePolicy {
    /// A rejected request is an error; the operation must not proceed.
    AllMustSucceed,
    /// A rejected request is worth a warning but not an abort.
    BestEffort,
}

/// One remote step: how to ask, and what a positive answer means.
pub trait CommunicationCommand: Send + Sync {
    /// Per-node contribution collected from successful responses.
    type Output: Send;

    /// Build the request for one target. Pure; called once per target.
    fn request(&self, target: &Target) -> NodeRequest;

    /// Interpret a 2xx response body. Returns progress/diagnostic items plus
    /// this node's output. Return `None` to drop the node from the
    /// successful set, pairing it with an item that says why.
    fn on_success(&self, node: &str, payload: &str) -> (Vec<ReportItem>, Option<Self::Output>);

    fn failure_policy(&self) -> RemoteFailurePolicy {
        RemoteFailurePolicy::AllMustSucceed
    }
}

/// What one executed step left behind: the targets that fully succeeded, in
/// label order, and their outputs. Multi-step operations feed `ok_targets`
/// into the next step.
pub struct CommandRun<O> {
    pub ok_targets: Vec<Target>,
    pub outputs: BTreeMap<String, O>,
}

impl<O> CommandRun<O> {
    pub fn empty() -> Self {
        Self {
            ok_targets: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// The single output of a single-target step, if that target succeeded.
    pub fn into_single(self) -> Option<O> {
        self.outputs.into_values().next()
    }
}

impl NodeCommunicator {
    /// Run `command` against `targets` and grade every outcome into report
    /// items under `policy`. Item order is deterministic: one debug item per
    /// target in label order, then per-node items in label order, then the
    /// all-failed item if no node made it through.
    pub async fn execute<C>(
        &self,
        targets: &[Target],
        command: &C,
        policy: &CommunicationPolicy,
        reports: &mut dyn ReportProcessor,
    ) -> CommandRun<C::Output>
    where
        C: CommunicationCommand,
    {
        let mut prepared: Vec<(Target, NodeRequest)> = targets
            .iter()
            .map(|target| (target.clone(), command.request(target)))
            .collect();
        prepared.sort_by(|(a, _), (b, _)| a.label().cmp(b.label()));

        let mut by_label: BTreeMap<String, Target> = BTreeMap::new();
        let mut routes: BTreeMap<String, String> = BTreeMap::new();
        for (target, request) in &prepared {
            by_label.insert(target.label().to_string(), target.clone());
            routes.insert(target.label().to_string(), request.route.clone());
            reports.report(ReportItem::debug(ReportMessage::NodeCommunicationStarted {
                node: target.label().to_string(),
                route: request.route.clone(),
            }));
        }

        let outcomes = self.run_prepared(prepared).await;

        let mut run = CommandRun::empty();
        for (label, outcome) in &outcomes {
            let route = routes.get(label).cloned().unwrap_or_default();
            match outcome {
                RequestOutcome::Success { payload } => {
                    let (items, output) = command.on_success(label, payload);
                    for item in items {
                        reports.report(apply_force(item, &policy.forces));
                    }
                    if let Some(output) = output {
                        run.outputs.insert(label.clone(), output);
                        if let Some(target) = by_label.get(label) {
                            run.ok_targets.push(target.clone());
                        }
                    }
                }
                RequestOutcome::ConnectError { reason } => {
                    reports.report(offline_item(
                        policy,
                        ReportMessage::NodeConnectionError {
                            node: label.clone(),
                            route,
                            reason: reason.clone(),
                        },
                    ));
                }
                RequestOutcome::Timeout => {
                    reports.report(offline_item(
                        policy,
                        ReportMessage::NodeRequestTimedOut {
                            node: label.clone(),
                            route,
                        },
                    ));
                }
                RequestOutcome::RemoteError { status, output } => {
                    let message = ReportMessage::RemoteCommandError {
                        node: label.clone(),
                        route,
                        status: *status,
                        output: output.clone(),
                    };
                    let item = match command.failure_policy() {
                        RemoteFailurePolicy::AllMustSucceed => ReportItem::error(message),
                        RemoteFailurePolicy::BestEffort => ReportItem::warning(message),
                    };
                    reports.report(item);
                }
            }
        }

        // Losing every node is fatal no matter how tolerant the step is. An
        // empty target set counts: a step that ran against nobody performed
        // the operation on no node.
        if run.ok_targets.is_empty() {
            reports.report(ReportItem::error(ReportMessage::UnableToPerformOnAnyNode));
        }
        run
    }
}

/// Connectivity failures are errors the `--skip-offline` code downgrades;
/// when the policy already tolerates offline nodes the item starts out as a
/// warning instead.
fn offline_item(policy: &CommunicationPolicy, message: ReportMessage) -> ReportItem {
    if policy.skip_offline {
        ReportItem::warning(message)
    } else {
        apply_force(
            ReportItem::forceable_error(ForceCode::SkipOffline, message),
            &policy.forces,
        )
    }
}
