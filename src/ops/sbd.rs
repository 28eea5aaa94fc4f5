//! SBD (storage-based death) management.
//!
//! Enabling SBD is the full pipeline: validate the option map and per-node
//! watchdogs, push the rendered config to every reachable node, enable the
//! service, then record the change in the cluster document. Disabling walks
//! the same stations in reverse. Either way the cluster needs a restart to
//! pick the change up, which both operations end by saying.

use serde_json::json;
use std::collections::BTreeMap;

use crate::comm::{CommunicationCommand, NodeRequest, Target};
use crate::reports::{
    AllowedValues, ForceCode, OperationAborted, ReportItem, ReportMessage, ServiceAction,
};
use crate::validate::{
    normalize, run, NamesIn, OptionMap, ValidatorAll, ValidatorFirstError, ValueBoolean, ValueIn,
    ValueIntegerInRange, ValueNotEmpty,
};

use super::auth::authenticated_targets;
use super::env::{OperationEnv, Outcome};
use super::labels;

const SBD_SERVICE: &str = "sbd";
const SBD_FENCE_AGENT: &str = "fence_sbd";
const DEFAULT_WATCHDOG: &str = "/dev/watchdog";

/// Caller input for [`enable_sbd`].
pub struct SbdEnableRequest {
    /// `SBD_*` options shared by every node.
    pub options: OptionMap,
    /// Watchdog device per node; nodes without an entry get
    /// `/dev/watchdog`.
    pub watchdog_by_node: BTreeMap<String, String>,
}

fn sbd_option_rules() -> ValidatorAll {
    ValidatorAll::new(vec![
        Box::new(
            NamesIn::new(
                [
                    "SBD_DELAY_START",
                    "SBD_STARTMODE",
                    "SBD_TIMEOUT_ACTION",
                    "SBD_WATCHDOG_TIMEOUT",
                ],
                "SBD",
            )
            .forceable(ForceCode::Force),
        ),
        Box::new(ValueBoolean::new("SBD_DELAY_START")),
        Box::new(ValueIn::new("SBD_STARTMODE", ["always", "clean"])),
        Box::new(
            ValueIn::new(
                "SBD_TIMEOUT_ACTION",
                ["flush", "noflush", "reboot", "crashdump", "off"],
            )
            .forceable(ForceCode::Force),
        ),
        // Empty is a removal everywhere else, but a watchdog timeout that is
        // set must be a real number; report the first problem only.
        Box::new(ValidatorFirstError::new(vec![
            Box::new(ValueNotEmpty::new("SBD_WATCHDOG_TIMEOUT")),
            Box::new(ValueIntegerInRange::new("SBD_WATCHDOG_TIMEOUT", 1, 3600)),
        ])),
    ])
}

// ── Commands ────────────────────────────────────────────────────────────────

/// Set (or with `None`, clear) the watchdog timeout on a node.
struct SetWatchdogTimeout {
    seconds: Option<u32>,
}

impl CommunicationCommand for SetWatchdogTimeout {
    type Output = ();

    fn request(&self, _target: &Target) -> NodeRequest {
        NodeRequest::new(
            "remote/sbd_set_watchdog",
            json!({ "watchdog_timeout": self.seconds }),
        )
    }

    fn on_success(&self, _node: &str, _payload: &str) -> (Vec<ReportItem>, Option<()>) {
        (Vec::new(), Some(()))
    }
}

/// Write the SBD environment file on a node. Payloads differ per node
/// because each node gets its own watchdog device.
struct SetSbdConfig {
    shared: BTreeMap<String, String>,
    watchdog_by_node: BTreeMap<String, String>,
}

impl CommunicationCommand for SetSbdConfig {
    type Output = ();

    fn request(&self, target: &Target) -> NodeRequest {
        let mut config = self.shared.clone();
        let watchdog = self
            .watchdog_by_node
            .get(target.label())
            .map(String::as_str)
            .unwrap_or(DEFAULT_WATCHDOG);
        config.insert("SBD_WATCHDOG_DEV".to_string(), watchdog.to_string());
        NodeRequest::new("remote/sbd_set_config", json!({ "config": config }))
    }

    fn on_success(&self, _node: &str, _payload: &str) -> (Vec<ReportItem>, Option<()>) {
        (Vec::new(), Some(()))
    }
}

/// Enable or disable the SBD service on a node.
struct SbdService {
    action: ServiceAction,
}

impl CommunicationCommand for SbdService {
    type Output = ();

    fn request(&self, _target: &Target) -> NodeRequest {
        let route = match self.action {
            ServiceAction::Enable => "remote/sbd_enable",
            _ => "remote/sbd_disable",
        };
        NodeRequest::new(route, json!({}))
    }

    fn on_success(&self, node: &str, _payload: &str) -> (Vec<ReportItem>, Option<()>) {
        (
            vec![ReportItem::info(ReportMessage::ServiceActionSucceeded {
                node: node.to_string(),
                service: SBD_SERVICE.to_string(),
                action: self.action,
            })],
            Some(()),
        )
    }
}

// ── Operations ──────────────────────────────────────────────────────────────

pub async fn enable_sbd(env: &mut OperationEnv, request: SbdEnableRequest) -> Outcome<()> {
    let result = enable(env, request).await;
    env.outcome(result)
}

async fn enable(env: &mut OperationEnv, request: SbdEnableRequest) -> Result<(), OperationAborted> {
    // Validating
    env.report_all(run(&sbd_option_rules(), &request.options));
    let mut unknown = Vec::new();
    for (node, watchdog) in &request.watchdog_by_node {
        if !env.inventory().contains(node) {
            unknown.push(node.clone());
            continue;
        }
        if !normalize(watchdog).starts_with('/') {
            env.report(
                ReportItem::error(ReportMessage::InvalidOptionValue {
                    option_name: "watchdog".to_string(),
                    option_value: watchdog.clone(),
                    allowed: AllowedValues::shape("an absolute device path"),
                })
                .in_context(node),
            );
        }
    }
    if !unknown.is_empty() {
        env.report(ReportItem::error(ReportMessage::UnknownNodes {
            nodes: unknown,
        }));
    }
    env.check()?;

    // Executing
    let targets = env.inventory().targets();
    let authed = authenticated_targets(env, &targets).await?;
    let shared = rendered_options(&request.options);
    let configured = env
        .execute(
            &authed,
            &SetSbdConfig {
                shared: shared.clone(),
                watchdog_by_node: request.watchdog_by_node,
            },
        )
        .await;
    env.check()?;

    env.report(ReportItem::info(ReportMessage::ServiceActionStarted {
        service: SBD_SERVICE.to_string(),
        action: ServiceAction::Enable,
        nodes: labels(&configured.ok_targets),
    }));
    env.execute(
        &configured.ok_targets,
        &SbdService {
            action: ServiceAction::Enable,
        },
    )
    .await;
    env.check()?;

    // Committing
    let mut document = env.load_document().await?;
    document.set_sbd(&shared);
    env.commit(document, None).await?;
    env.report(ReportItem::warning(ReportMessage::ClusterRestartRequired));
    Ok(())
}

pub async fn disable_sbd(env: &mut OperationEnv) -> Outcome<()> {
    let result = disable(env).await;
    env.outcome(result)
}

async fn disable(env: &mut OperationEnv) -> Result<(), OperationAborted> {
    let targets = env.inventory().targets();
    let authed = authenticated_targets(env, &targets).await?;

    // Clear the watchdog timeout first so a half-disabled node cannot
    // self-fence on the old timings.
    let cleared = env
        .execute(&authed, &SetWatchdogTimeout { seconds: None })
        .await;
    env.check()?;

    env.report(ReportItem::info(ReportMessage::ServiceActionStarted {
        service: SBD_SERVICE.to_string(),
        action: ServiceAction::Disable,
        nodes: labels(&cleared.ok_targets),
    }));
    env.execute(
        &cleared.ok_targets,
        &SbdService {
            action: ServiceAction::Disable,
        },
    )
    .await;
    env.check()?;

    // Committing. Watchdog fencing makes no sense without the SBD daemon,
    // so its fence devices leave the document together with the section.
    let mut document = env.load_document().await?;
    document.remove_sbd();
    document.remove_fence_devices_by_agent(SBD_FENCE_AGENT);
    env.commit(document, None).await?;
    env.report(ReportItem::warning(ReportMessage::ClusterRestartRequired));
    Ok(())
}

/// Normalized non-removal options, ready for the wire and the document.
fn rendered_options(options: &OptionMap) -> BTreeMap<String, String> {
    options
        .iter()
        .filter(|(_, pair)| !pair.is_removal())
        .map(|(name, pair)| (name.clone(), pair.normalized().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::options_from;

    #[test]
    fn option_rules_accept_a_sane_map() {
        let options = options_from([
            ("SBD_DELAY_START", "no"),
            ("SBD_STARTMODE", "clean"),
            ("SBD_WATCHDOG_TIMEOUT", "10"),
        ]);
        assert!(run(&sbd_option_rules(), &options).is_empty());
    }

    #[test]
    fn watchdog_timeout_reports_one_error_at_a_time() {
        let empty = options_from([("SBD_WATCHDOG_TIMEOUT", " ")]);
        let items = run(&sbd_option_rules(), &empty);
        assert_eq!(items.len(), 1);

        let out_of_range = options_from([("SBD_WATCHDOG_TIMEOUT", "9000")]);
        let items = run(&sbd_option_rules(), &out_of_range);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn unknown_option_is_forceable() {
        let options = options_from([("SBD_BOGUS", "1")]);
        let items = run(&sbd_option_rules(), &options);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].force_code, Some(ForceCode::Force));
    }

    #[test]
    fn per_node_watchdog_lands_in_the_payload() {
        let command = SetSbdConfig {
            shared: [("SBD_DELAY_START".to_string(), "1".to_string())]
                .into_iter()
                .collect(),
            watchdog_by_node: [("n1".to_string(), "/dev/wdt0".to_string())]
                .into_iter()
                .collect(),
        };

        let with_override = command.request(&Target::from_label("n1"));
        assert_eq!(
            with_override.payload["config"]["SBD_WATCHDOG_DEV"],
            "/dev/wdt0"
        );
        assert_eq!(with_override.payload["config"]["SBD_DELAY_START"], "1");

        let defaulted = command.request(&Target::from_label("n2"));
        assert_eq!(
            defaulted.payload["config"]["SBD_WATCHDOG_DEV"],
            DEFAULT_WATCHDOG
        );
    }

    #[test]
    fn rendered_options_drop_removals() {
        let options = options_from([("SBD_DELAY_START", " 1 "), ("SBD_STARTMODE", "")]);
        let rendered = rendered_options(&options);
        assert_eq!(rendered.get("SBD_DELAY_START").map(String::as_str), Some("1"));
        assert!(!rendered.contains_key("SBD_STARTMODE"));
    }
}
