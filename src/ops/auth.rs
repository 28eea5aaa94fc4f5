//! Agent liveness and compatibility gate.
//!
//! Every multi-node operation starts by poking `remote/check_auth` on each
//! target. A node that answers proves the token works, and its reported
//! agent version is held against the range this tool knows how to talk to.

use semver::{Version, VersionReq};
use serde::Deserialize;
use serde_json::json;

use crate::comm::{CommunicationCommand, NodeRequest, Target};
use crate::reports::{OperationAborted, ReportItem, ReportMessage};

use super::env::OperationEnv;

/// Agent versions this tool can drive.
pub const REQUIRED_AGENT: &str = ">=0.10.0";

fn required_range() -> VersionReq {
    // The literal above is covered by a test; an unparsable range would
    // degrade to "any version".
    VersionReq::parse(REQUIRED_AGENT).unwrap_or_default()
}

#[derive(Deserialize)]
struct CheckAuthBody {
    version: String,
}

pub struct CheckAuth;

impl CommunicationCommand for CheckAuth {
    type Output = Version;

    fn request(&self, _target: &Target) -> NodeRequest {
        NodeRequest::new("remote/check_auth", json!({}))
    }

    fn on_success(&self, node: &str, payload: &str) -> (Vec<ReportItem>, Option<Version>) {
        let reported = serde_json::from_str::<CheckAuthBody>(payload)
            .ok()
            .and_then(|body| Version::parse(&body.version).ok());
        match reported {
            Some(version) if required_range().matches(&version) => (Vec::new(), Some(version)),
            Some(version) => (
                vec![ReportItem::error(ReportMessage::AgentIncompatible {
                    node: node.to_string(),
                    version: version.to_string(),
                    required: REQUIRED_AGENT.to_string(),
                })],
                None,
            ),
            None => (
                vec![ReportItem::error(ReportMessage::AgentIncompatible {
                    node: node.to_string(),
                    version: "unknown".to_string(),
                    required: REQUIRED_AGENT.to_string(),
                })],
                None,
            ),
        }
    }
}

/// The standard opening step: check every target, abort if the report picked
/// up errors, and hand back the targets that passed.
pub async fn authenticated_targets(
    env: &mut OperationEnv,
    targets: &[Target],
) -> Result<Vec<Target>, OperationAborted> {
    let run = env.execute(targets, &CheckAuth).await;
    env.check()?;
    Ok(run.ok_targets)
}
