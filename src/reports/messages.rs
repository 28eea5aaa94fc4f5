//! Message catalog — the closed set of report codes and their payloads.
//!
//! Every code string and payload field name here is part of the
//! machine-readable report contract; renaming one is a breaking change for
//! anything parsing exported reports. Human wording in the `Display` impl is
//! free to evolve.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// What is being done to a system service on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Enable,
    Disable,
    Start,
    Stop,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Enable => "enable",
            ServiceAction::Disable => "disable",
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
        }
    }

    fn gerund(&self) -> &'static str {
        match self {
            ServiceAction::Enable => "enabling",
            ServiceAction::Disable => "disabling",
            ServiceAction::Start => "starting",
            ServiceAction::Stop => "stopping",
        }
    }

    fn past(&self) -> &'static str {
        match self {
            ServiceAction::Enable => "enabled",
            ServiceAction::Disable => "disabled",
            ServiceAction::Start => "started",
            ServiceAction::Stop => "stopped",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The legal values of an option, for value-violation payloads. Either a
/// closed list or a prose description of the accepted shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedValues {
    List(Vec<String>),
    Shape(String),
}

impl AllowedValues {
    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    pub fn shape(description: impl Into<String>) -> Self {
        Self::Shape(description.into())
    }

    fn to_value(&self) -> Value {
        match self {
            AllowedValues::List(values) => json!(values),
            AllowedValues::Shape(description) => json!(description),
        }
    }
}

impl fmt::Display for AllowedValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowedValues::List(values) => write!(f, "{}", quoted_list(values)),
            AllowedValues::Shape(description) => f.write_str(description),
        }
    }
}

/// Everything the engine can report, with structured payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportMessage {
    // Option validation
    InvalidOptions {
        option_names: Vec<String>,
        allowed: Vec<String>,
        option_type: String,
    },
    RequiredOptionsMissing {
        option_names: Vec<String>,
        option_type: String,
    },
    RequiredOptionOfAlternativesMissing {
        option_names: Vec<String>,
        option_type: String,
    },
    MutuallyExclusiveOptions {
        option_names: Vec<String>,
        option_type: String,
    },
    PrerequisiteOptionMissing {
        option_name: String,
        prerequisite: String,
        option_type: String,
    },
    InvalidOptionValue {
        option_name: String,
        option_value: String,
        allowed: AllowedValues,
    },

    // Cluster state validation
    UnknownNodes {
        nodes: Vec<String>,
    },
    ResourcesNotFound {
        ids: Vec<String>,
    },
    AgentIncompatible {
        node: String,
        version: String,
        required: String,
    },
    QnetdHostNotConfigured,

    // Node communication
    NodeCommunicationStarted {
        node: String,
        route: String,
    },
    NodeConnectionError {
        node: String,
        route: String,
        reason: String,
    },
    NodeRequestTimedOut {
        node: String,
        route: String,
    },
    RemoteCommandError {
        node: String,
        route: String,
        status: u16,
        output: String,
    },
    UnableToPerformOnAnyNode,
    ClusterConfigDistributionNodesUnavailable {
        nodes: Vec<String>,
    },

    // Operation progress
    ServiceActionStarted {
        service: String,
        action: ServiceAction,
        nodes: Vec<String>,
    },
    ServiceActionSucceeded {
        node: String,
        service: String,
        action: ServiceAction,
    },
    QdeviceCertificateDistributionStarted,
    QdeviceCertificateAcceptedByNode {
        node: String,
    },
    QdeviceCertificateInvalid {
        node: String,
        reason: String,
    },

    // Local side effects
    LocalCommandError {
        argv: Vec<String>,
        reason: String,
    },
    ClusterConfigPushFailed {
        reason: String,
    },
    ClusterRestartRequired,
}

impl ReportMessage {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ReportMessage::InvalidOptions { .. } => "INVALID_OPTIONS",
            ReportMessage::RequiredOptionsMissing { .. } => "REQUIRED_OPTIONS_MISSING",
            ReportMessage::RequiredOptionOfAlternativesMissing { .. } => {
                "REQUIRED_OPTION_OF_ALTERNATIVES_MISSING"
            }
            ReportMessage::MutuallyExclusiveOptions { .. } => "MUTUALLY_EXCLUSIVE_OPTIONS",
            ReportMessage::PrerequisiteOptionMissing { .. } => "PREREQUISITE_OPTION_MISSING",
            ReportMessage::InvalidOptionValue { .. } => "INVALID_OPTION_VALUE",
            ReportMessage::UnknownNodes { .. } => "UNKNOWN_NODES",
            ReportMessage::ResourcesNotFound { .. } => "RESOURCES_NOT_FOUND",
            ReportMessage::AgentIncompatible { .. } => "AGENT_INCOMPATIBLE",
            ReportMessage::QnetdHostNotConfigured => "QNETD_HOST_NOT_CONFIGURED",
            ReportMessage::NodeCommunicationStarted { .. } => "NODE_COMMUNICATION_STARTED",
            ReportMessage::NodeConnectionError { .. } => "NODE_CONNECTION_ERROR",
            ReportMessage::NodeRequestTimedOut { .. } => "NODE_REQUEST_TIMED_OUT",
            ReportMessage::RemoteCommandError { .. } => "REMOTE_COMMAND_ERROR",
            ReportMessage::UnableToPerformOnAnyNode => "UNABLE_TO_PERFORM_OPERATION_ON_ANY_NODE",
            ReportMessage::ClusterConfigDistributionNodesUnavailable { .. } => {
                "CLUSTER_CONFIG_DISTRIBUTION_NODES_UNAVAILABLE"
            }
            ReportMessage::ServiceActionStarted { .. } => "SERVICE_ACTION_STARTED",
            ReportMessage::ServiceActionSucceeded { .. } => "SERVICE_ACTION_SUCCEEDED",
            ReportMessage::QdeviceCertificateDistributionStarted => {
                "QDEVICE_CERTIFICATE_DISTRIBUTION_STARTED"
            }
            ReportMessage::QdeviceCertificateAcceptedByNode { .. } => {
                "QDEVICE_CERTIFICATE_ACCEPTED_BY_NODE"
            }
            ReportMessage::QdeviceCertificateInvalid { .. } => "QDEVICE_CERTIFICATE_INVALID",
            ReportMessage::LocalCommandError { .. } => "LOCAL_COMMAND_ERROR",
            ReportMessage::ClusterConfigPushFailed { .. } => "CLUSTER_CONFIG_PUSH_FAILED",
            ReportMessage::ClusterRestartRequired => "CLUSTER_RESTART_REQUIRED",
        }
    }

    /// Structured payload for report export. Keys come out sorted, so the
    /// serialized form is deterministic.
    pub fn payload(&self) -> Value {
        match self {
            ReportMessage::InvalidOptions {
                option_names,
                allowed,
                option_type,
            } => json!({
                "option_names": option_names,
                "allowed": allowed,
                "option_type": option_type,
            }),
            ReportMessage::RequiredOptionsMissing {
                option_names,
                option_type,
            } => json!({
                "option_names": option_names,
                "option_type": option_type,
            }),
            ReportMessage::RequiredOptionOfAlternativesMissing {
                option_names,
                option_type,
            } => json!({
                "option_names": option_names,
                "option_type": option_type,
            }),
            ReportMessage::MutuallyExclusiveOptions {
                option_names,
                option_type,
            } => json!({
                "option_names": option_names,
                "option_type": option_type,
            }),
            ReportMessage::PrerequisiteOptionMissing {
                option_name,
                prerequisite,
                option_type,
            } => json!({
                "option_name": option_name,
                "prerequisite": prerequisite,
                "option_type": option_type,
            }),
            ReportMessage::InvalidOptionValue {
                option_name,
                option_value,
                allowed,
            } => json!({
                "option_name": option_name,
                "option_value": option_value,
                "allowed": allowed.to_value(),
            }),
            ReportMessage::UnknownNodes { nodes } => json!({ "nodes": nodes }),
            ReportMessage::ResourcesNotFound { ids } => json!({ "ids": ids }),
            ReportMessage::AgentIncompatible {
                node,
                version,
                required,
            } => json!({
                "node": node,
                "version": version,
                "required": required,
            }),
            ReportMessage::QnetdHostNotConfigured => json!({}),
            ReportMessage::NodeCommunicationStarted { node, route } => json!({
                "node": node,
                "route": route,
            }),
            ReportMessage::NodeConnectionError {
                node,
                route,
                reason,
            } => json!({
                "node": node,
                "route": route,
                "reason": reason,
            }),
            ReportMessage::NodeRequestTimedOut { node, route } => json!({
                "node": node,
                "route": route,
            }),
            ReportMessage::RemoteCommandError {
                node,
                route,
                status,
                output,
            } => json!({
                "node": node,
                "route": route,
                "status": status,
                "output": output,
            }),
            ReportMessage::UnableToPerformOnAnyNode => json!({}),
            ReportMessage::ClusterConfigDistributionNodesUnavailable { nodes } => {
                json!({ "nodes": nodes })
            }
            ReportMessage::ServiceActionStarted {
                service,
                action,
                nodes,
            } => json!({
                "service": service,
                "action": action.as_str(),
                "nodes": nodes,
            }),
            ReportMessage::ServiceActionSucceeded {
                node,
                service,
                action,
            } => json!({
                "node": node,
                "service": service,
                "action": action.as_str(),
            }),
            ReportMessage::QdeviceCertificateDistributionStarted => json!({}),
            ReportMessage::QdeviceCertificateAcceptedByNode { node } => json!({ "node": node }),
            ReportMessage::QdeviceCertificateInvalid { node, reason } => json!({
                "node": node,
                "reason": reason,
            }),
            ReportMessage::LocalCommandError { argv, reason } => json!({
                "argv": argv,
                "reason": reason,
            }),
            ReportMessage::ClusterConfigPushFailed { reason } => json!({ "reason": reason }),
            ReportMessage::ClusterRestartRequired => json!({}),
        }
    }
}

impl fmt::Display for ReportMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportMessage::InvalidOptions {
                option_names,
                allowed,
                option_type,
            } => write!(
                f,
                "invalid {} option{}: {}, allowed options are: {}",
                option_type,
                plural(option_names),
                quoted_list(option_names),
                quoted_list(allowed),
            ),
            ReportMessage::RequiredOptionsMissing {
                option_names,
                option_type,
            } => write!(
                f,
                "required {} option{} {} missing",
                option_type,
                plural(option_names),
                quoted_list(option_names),
            ),
            ReportMessage::RequiredOptionOfAlternativesMissing {
                option_names,
                option_type,
            } => write!(
                f,
                "at least one {} option of {} must be set",
                option_type,
                quoted_list(option_names),
            ),
            ReportMessage::MutuallyExclusiveOptions {
                option_names,
                option_type,
            } => write!(
                f,
                "{} options {} are mutually exclusive",
                option_type,
                quoted_list(option_names),
            ),
            ReportMessage::PrerequisiteOptionMissing {
                option_name,
                prerequisite,
                option_type,
            } => write!(
                f,
                "{} option '{}' requires '{}' to be set as well",
                option_type, option_name, prerequisite,
            ),
            ReportMessage::InvalidOptionValue {
                option_name,
                option_value,
                allowed,
            } => write!(
                f,
                "'{}' is not a valid value for option '{}', allowed: {}",
                option_value, option_name, allowed,
            ),
            ReportMessage::UnknownNodes { nodes } => write!(
                f,
                "node{} {} not found in the cluster inventory",
                plural(nodes),
                quoted_list(nodes),
            ),
            ReportMessage::ResourcesNotFound { ids } => write!(
                f,
                "fence device{} {} not configured in the cluster",
                plural(ids),
                quoted_list(ids),
            ),
            ReportMessage::AgentIncompatible {
                node,
                version,
                required,
            } => write!(
                f,
                "agent on node '{}' reports version {} but {} is required",
                node, version, required,
            ),
            ReportMessage::QnetdHostNotConfigured => {
                f.write_str("no quorum device host is configured in the inventory")
            }
            ReportMessage::NodeCommunicationStarted { node, route } => {
                write!(f, "sending '{}' to node '{}'", route, node)
            }
            ReportMessage::NodeConnectionError {
                node,
                route,
                reason,
            } => write!(
                f,
                "unable to connect to node '{}' ({}): {}",
                node, route, reason,
            ),
            ReportMessage::NodeRequestTimedOut { node, route } => {
                write!(f, "request '{}' to node '{}' timed out", route, node)
            }
            ReportMessage::RemoteCommandError {
                node,
                route,
                status,
                output,
            } => write!(
                f,
                "node '{}' rejected '{}' with status {}: {}",
                node, route, status, output,
            ),
            ReportMessage::UnableToPerformOnAnyNode => {
                f.write_str("unable to perform the operation on any available node")
            }
            ReportMessage::ClusterConfigDistributionNodesUnavailable { nodes } => write!(
                f,
                "unable to distribute the cluster configuration to node{} {}",
                plural(nodes),
                quoted_list(nodes),
            ),
            ReportMessage::ServiceActionStarted {
                service,
                action,
                nodes,
            } => write!(
                f,
                "{} {} on node{} {}",
                action.gerund(),
                service,
                plural(nodes),
                quoted_list(nodes),
            ),
            ReportMessage::ServiceActionSucceeded {
                node,
                service,
                action,
            } => write!(f, "node '{}': {} {}", node, service, action.past()),
            ReportMessage::QdeviceCertificateDistributionStarted => {
                f.write_str("distributing quorum device certificates to cluster nodes")
            }
            ReportMessage::QdeviceCertificateAcceptedByNode { node } => {
                write!(f, "node '{}' accepted the quorum device certificate", node)
            }
            ReportMessage::QdeviceCertificateInvalid { node, reason } => write!(
                f,
                "node '{}' returned an unusable quorum device certificate: {}",
                node, reason,
            ),
            ReportMessage::LocalCommandError { argv, reason } => {
                write!(f, "local command '{}' failed: {}", argv.join(" "), reason)
            }
            ReportMessage::ClusterConfigPushFailed { reason } => {
                write!(f, "pushing the updated cluster configuration failed: {}", reason)
            }
            ReportMessage::ClusterRestartRequired => {
                f.write_str("cluster restart is required to apply the changes")
            }
        }
    }
}

fn plural(items: &[String]) -> &'static str {
    if items.len() == 1 {
        ""
    } else {
        "s"
    }
}

fn quoted_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("'{}'", item))
        .collect::<Vec<_>>()
        .join(", ")
}
