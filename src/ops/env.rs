//! Operation environment — the shared context every operation runs in.
//!
//! Internally an operation is ordinary `Result` code: report items, hit
//! [`OperationEnv::check`] between phases, bail with `?` when the report has
//! errors. The public surface is [`Outcome`], which carries either the value
//! or the report snapshot of the aborted run; the abort marker itself stays
//! payload-free.

use serde_json::json;
use tracing::info;

use crate::comm::{
    CommandRun, CommunicationCommand, CommunicationPolicy, NodeCommunicator, NodeRequest, Target,
};
use crate::config::Inventory;
use crate::reports::{
    apply_force, ForceFlags, OperationAborted, ReportEntry, ReportItem, ReportMessage,
    ReportProcessor, SimpleReportProcessor,
};
use crate::runner::CommandRunner;

/// Local tool that exports and imports the cluster configuration document.
const CLUSTER_CFG_TOOL: &str = "cluster-cfg";

/// Per-operation caller choices.
#[derive(Debug, Clone, Default)]
pub struct OperationOptions {
    pub forces: ForceFlags,
    pub skip_offline: bool,
}

/// What an operation hands back to its caller.
#[derive(Debug)]
pub enum Outcome<T> {
    Ok(T),
    Aborted(Vec<ReportEntry>),
}

impl<T> Outcome<T> {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Outcome::Aborted(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::Aborted(_) => None,
        }
    }
}

pub struct OperationEnv {
    pub reports: SimpleReportProcessor,
    communicator: NodeCommunicator,
    runner: Box<dyn CommandRunner>,
    inventory: Inventory,
    options: OperationOptions,
}

impl OperationEnv {
    pub fn new(
        inventory: Inventory,
        communicator: NodeCommunicator,
        runner: Box<dyn CommandRunner>,
        options: OperationOptions,
    ) -> Self {
        Self {
            reports: SimpleReportProcessor::new(),
            communicator,
            runner,
            inventory,
            options,
        }
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn options(&self) -> &OperationOptions {
        &self.options
    }

    pub fn policy(&self) -> CommunicationPolicy {
        CommunicationPolicy::new(self.options.forces.clone(), self.options.skip_offline)
    }

    /// Report one item with the operation's force flags applied.
    pub fn report(&mut self, item: ReportItem) {
        self.reports.report(apply_force(item, &self.options.forces));
    }

    pub fn report_all(&mut self, items: Vec<ReportItem>) {
        for item in items {
            self.report(item);
        }
    }

    /// Gate between phases: `Err` as soon as any error has been reported.
    pub fn check(&self) -> Result<(), OperationAborted> {
        self.reports.check()
    }

    /// Wrap an internal result into the public outcome, snapshotting the
    /// report on abort.
    pub fn outcome<T>(&self, result: Result<T, OperationAborted>) -> Outcome<T> {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(OperationAborted) => Outcome::Aborted(self.reports.entries()),
        }
    }

    /// Run one communication command under this operation's policy.
    pub async fn execute<C>(&mut self, targets: &[Target], command: &C) -> CommandRun<C::Output>
    where
        C: CommunicationCommand,
    {
        let policy = self.policy();
        self.communicator
            .execute(targets, command, &policy, &mut self.reports)
            .await
    }

    /// Turn node labels into targets. `None` means every inventory node.
    /// Unknown labels are reported in one batched error.
    pub fn resolve_targets(
        &mut self,
        labels: Option<&[String]>,
    ) -> Result<Vec<Target>, OperationAborted> {
        let Some(labels) = labels else {
            return Ok(self.inventory.targets());
        };
        let mut targets = Vec::new();
        let mut unknown = Vec::new();
        for label in labels {
            match self.inventory.target(label) {
                Some(target) => targets.push(target),
                None => unknown.push(label.clone()),
            }
        }
        if !unknown.is_empty() {
            unknown.sort();
            unknown.dedup();
            self.report(ReportItem::error(ReportMessage::UnknownNodes {
                nodes: unknown,
            }));
        }
        self.check()?;
        Ok(targets)
    }

    /// Run a local tool, reporting failure and aborting unless it exits
    /// zero. Returns captured stdout.
    pub async fn run_local(
        &mut self,
        argv: &[&str],
        stdin: Option<&str>,
    ) -> Result<String, OperationAborted> {
        let owned_argv: Vec<String> = argv.iter().map(|a| a.to_string()).collect();
        match self.runner.run(argv, stdin).await {
            Ok(output) if output.success() => Ok(output.stdout),
            Ok(output) => {
                let reason = if output.stderr.trim().is_empty() {
                    format!("exited with status {}", output.status)
                } else {
                    output.stderr.trim().to_string()
                };
                self.report(ReportItem::error(ReportMessage::LocalCommandError {
                    argv: owned_argv,
                    reason,
                }));
                Err(OperationAborted)
            }
            Err(err) => {
                self.report(ReportItem::error(ReportMessage::LocalCommandError {
                    argv: owned_argv,
                    reason: err.to_string(),
                }));
                Err(OperationAborted)
            }
        }
    }

    /// Export the current cluster configuration document.
    pub async fn load_document(&mut self) -> Result<super::ClusterDocument, OperationAborted> {
        let raw = self.run_local(&[CLUSTER_CFG_TOOL, "export"], None).await?;
        match super::ClusterDocument::parse(&raw) {
            Ok(document) => Ok(document),
            Err(err) => {
                self.report(ReportItem::error(ReportMessage::LocalCommandError {
                    argv: vec![CLUSTER_CFG_TOOL.into(), "export".into()],
                    reason: format!("invalid configuration document: {err}"),
                }));
                Err(OperationAborted)
            }
        }
    }

    /// Persist the document: bump its version, optionally distribute it to
    /// the given nodes first, then import it locally. The one place durable
    /// state changes. A failed import is reported, never rolled back; remote
    /// changes made earlier in the operation stand.
    pub async fn commit(
        &mut self,
        mut document: super::ClusterDocument,
        distribute: Option<&[Target]>,
    ) -> Result<(), OperationAborted> {
        document.finalize();
        if let Some(targets) = distribute {
            let rendered = document.to_json();
            let run = self.execute(targets, &SetClusterConf { rendered }).await;
            self.check()?;
            // `--skip-offline` grades a node that dropped mid-operation down
            // to a warning, but a document only part of the cluster holds is
            // a version split, not a degraded success. No local import until
            // every distribution target took it.
            let missing = super::missing_labels(targets, &run.ok_targets);
            if !missing.is_empty() {
                self.report(ReportItem::error(
                    ReportMessage::ClusterConfigDistributionNodesUnavailable { nodes: missing },
                ));
                return Err(OperationAborted);
            }
        }
        let rendered = document.to_json();
        match self.runner.run(&[CLUSTER_CFG_TOOL, "import"], Some(&rendered)).await {
            Ok(output) if output.success() => {
                info!(
                    version = document.config_version(),
                    "cluster configuration committed"
                );
                Ok(())
            }
            Ok(output) => {
                let reason = if output.stderr.trim().is_empty() {
                    format!("exited with status {}", output.status)
                } else {
                    output.stderr.trim().to_string()
                };
                self.report(ReportItem::error(ReportMessage::ClusterConfigPushFailed {
                    reason,
                }));
                Err(OperationAborted)
            }
            Err(err) => {
                self.report(ReportItem::error(ReportMessage::ClusterConfigPushFailed {
                    reason: err.to_string(),
                }));
                Err(OperationAborted)
            }
        }
    }
}

/// Distribute the rendered configuration document. Every node must take it;
/// a node that refuses leaves the cluster split on config versions, which is
/// exactly what the abort prevents.
struct SetClusterConf {
    rendered: String,
}

impl CommunicationCommand for SetClusterConf {
    type Output = ();

    fn request(&self, _target: &Target) -> NodeRequest {
        NodeRequest::new("remote/set_cluster_conf", json!({ "config": self.rendered }))
    }

    fn on_success(&self, _node: &str, _payload: &str) -> (Vec<ReportItem>, Option<()>) {
        (Vec::new(), Some(()))
    }
}
