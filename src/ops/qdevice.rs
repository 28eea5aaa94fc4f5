//! Quorum device client operations.
//!
//! The certificate setup is the long haul: fetch the CA from the qnetd host,
//! initialize certificate storage on every cluster node, generate and sign a
//! certificate request for this cluster, convert it locally and import the
//! result on every node that got its storage set up. Enable/disable are
//! plain service choreography by comparison.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::comm::{CommunicationCommand, NodeRequest, RemoteFailurePolicy, Target};
use crate::reports::{OperationAborted, ReportItem, ReportMessage, ServiceAction};

use super::auth::authenticated_targets;
use super::env::{OperationEnv, Outcome};
use super::labels;

const QDEVICE_SERVICE: &str = "corosync-qdevice";
const CERTUTIL_TOOL: &str = "qdevice-net-certutil";

/// Decode a base64 certificate blob, handing back the trimmed blob and its
/// fingerprint for the log.
fn checked_cert(node: &str, payload: &str) -> Result<String, ReportItem> {
    let blob = payload.trim().to_string();
    match BASE64.decode(blob.as_bytes()) {
        Ok(der) => {
            let hash = Sha256::digest(&der);
            debug!(node, fingerprint = %format!("sha256:{:x}", hash), "certificate received");
            Ok(blob)
        }
        Err(err) => Err(ReportItem::error(
            ReportMessage::QdeviceCertificateInvalid {
                node: node.to_string(),
                reason: err.to_string(),
            },
        )),
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

/// Fetch the CA certificate from the qnetd host.
struct GetCaCert;

impl CommunicationCommand for GetCaCert {
    type Output = String;

    fn request(&self, _target: &Target) -> NodeRequest {
        NodeRequest::new("remote/qdevice_net_get_ca_certificate", json!({}))
    }

    fn on_success(&self, node: &str, payload: &str) -> (Vec<ReportItem>, Option<String>) {
        match checked_cert(node, payload) {
            Ok(blob) => (Vec::new(), Some(blob)),
            Err(item) => (vec![item], None),
        }
    }
}

struct InitCertStorage {
    ca_cert: String,
}

impl CommunicationCommand for InitCertStorage {
    type Output = ();

    fn request(&self, _target: &Target) -> NodeRequest {
        NodeRequest::new(
            "remote/qdevice_net_client_init_certificate_storage",
            json!({ "ca_certificate": self.ca_cert }),
        )
    }

    fn on_success(&self, _node: &str, _payload: &str) -> (Vec<ReportItem>, Option<()>) {
        (Vec::new(), Some(()))
    }
}

/// Have the qnetd host sign this cluster's certificate request.
struct SignCertRequest {
    cert_request: String,
    cluster_name: String,
}

impl CommunicationCommand for SignCertRequest {
    type Output = String;

    fn request(&self, _target: &Target) -> NodeRequest {
        NodeRequest::new(
            "remote/qdevice_net_sign_node_certificate",
            json!({
                "certificate_request": self.cert_request,
                "cluster_name": self.cluster_name,
            }),
        )
    }

    fn on_success(&self, node: &str, payload: &str) -> (Vec<ReportItem>, Option<String>) {
        match checked_cert(node, payload) {
            Ok(blob) => (Vec::new(), Some(blob)),
            Err(item) => (vec![item], None),
        }
    }
}

struct ImportCert {
    pk12: String,
}

impl CommunicationCommand for ImportCert {
    type Output = ();

    fn request(&self, _target: &Target) -> NodeRequest {
        NodeRequest::new(
            "remote/qdevice_net_client_import_certificate",
            json!({ "certificate": self.pk12 }),
        )
    }

    fn on_success(&self, node: &str, _payload: &str) -> (Vec<ReportItem>, Option<()>) {
        (
            vec![ReportItem::info(
                ReportMessage::QdeviceCertificateAcceptedByNode {
                    node: node.to_string(),
                },
            )],
            Some(()),
        )
    }
}

/// Service choreography for the qdevice client daemon. Start and stop are
/// best effort; a node where the daemon is already in the right state must
/// not sink the operation.
struct QdeviceClientService {
    action: ServiceAction,
}

impl CommunicationCommand for QdeviceClientService {
    type Output = ();

    fn request(&self, _target: &Target) -> NodeRequest {
        let route = match self.action {
            ServiceAction::Enable => "remote/qdevice_client_enable",
            ServiceAction::Disable => "remote/qdevice_client_disable",
            ServiceAction::Start => "remote/qdevice_client_start",
            ServiceAction::Stop => "remote/qdevice_client_stop",
        };
        NodeRequest::new(route, json!({}))
    }

    fn on_success(&self, node: &str, _payload: &str) -> (Vec<ReportItem>, Option<()>) {
        (
            vec![ReportItem::info(ReportMessage::ServiceActionSucceeded {
                node: node.to_string(),
                service: QDEVICE_SERVICE.to_string(),
                action: self.action,
            })],
            Some(()),
        )
    }

    fn failure_policy(&self) -> RemoteFailurePolicy {
        match self.action {
            ServiceAction::Start | ServiceAction::Stop => RemoteFailurePolicy::BestEffort,
            ServiceAction::Enable | ServiceAction::Disable => RemoteFailurePolicy::AllMustSucceed,
        }
    }
}

// ── Operations ──────────────────────────────────────────────────────────────

pub async fn setup_client_certificates(env: &mut OperationEnv) -> Outcome<()> {
    let result = setup_certs(env).await;
    env.outcome(result)
}

async fn setup_certs(env: &mut OperationEnv) -> Result<(), OperationAborted> {
    let Some(qnetd) = env.inventory().qnetd_target() else {
        env.report(ReportItem::error(ReportMessage::QnetdHostNotConfigured));
        return Err(OperationAborted);
    };
    let cluster_name = env.inventory().cluster_name.clone();

    let targets = env.inventory().targets();
    let authed = authenticated_targets(env, &targets).await?;
    env.report(ReportItem::info(
        ReportMessage::QdeviceCertificateDistributionStarted,
    ));

    // CA from the qnetd host, storage on the cluster nodes.
    let ca_run = env.execute(&[qnetd.clone()], &GetCaCert).await;
    env.check()?;
    let Some(ca_cert) = ca_run.into_single() else {
        return Err(OperationAborted);
    };
    let initialized = env.execute(&authed, &InitCertStorage { ca_cert }).await;
    env.check()?;

    // Certificate request: generated here, signed by the qnetd host,
    // converted here, imported by the nodes.
    let cert_request = env
        .run_local(&[CERTUTIL_TOOL, "-r", "-n", &cluster_name], None)
        .await?;
    let signed_run = env
        .execute(
            &[qnetd],
            &SignCertRequest {
                cert_request: cert_request.trim().to_string(),
                cluster_name,
            },
        )
        .await;
    env.check()?;
    let Some(signed) = signed_run.into_single() else {
        return Err(OperationAborted);
    };
    let pk12 = env
        .run_local(&[CERTUTIL_TOOL, "-M", "-c", "-"], Some(&signed))
        .await?;
    env.execute(
        &initialized.ok_targets,
        &ImportCert {
            pk12: pk12.trim().to_string(),
        },
    )
    .await;
    env.check()?;
    Ok(())
}

pub async fn enable_client(env: &mut OperationEnv) -> Outcome<()> {
    let result = enable(env).await;
    env.outcome(result)
}

async fn enable(env: &mut OperationEnv) -> Result<(), OperationAborted> {
    let targets = env.inventory().targets();
    let authed = authenticated_targets(env, &targets).await?;

    env.report(ReportItem::info(ReportMessage::ServiceActionStarted {
        service: QDEVICE_SERVICE.to_string(),
        action: ServiceAction::Enable,
        nodes: labels(&authed),
    }));
    let enabled = env
        .execute(
            &authed,
            &QdeviceClientService {
                action: ServiceAction::Enable,
            },
        )
        .await;
    env.check()?;

    env.report(ReportItem::info(ReportMessage::ServiceActionStarted {
        service: QDEVICE_SERVICE.to_string(),
        action: ServiceAction::Start,
        nodes: labels(&enabled.ok_targets),
    }));
    env.execute(
        &enabled.ok_targets,
        &QdeviceClientService {
            action: ServiceAction::Start,
        },
    )
    .await;
    env.check()?;
    Ok(())
}

pub async fn disable_client(env: &mut OperationEnv) -> Outcome<()> {
    let result = disable(env).await;
    env.outcome(result)
}

async fn disable(env: &mut OperationEnv) -> Result<(), OperationAborted> {
    let targets = env.inventory().targets();
    let authed = authenticated_targets(env, &targets).await?;

    // Stop before disable, but disable everywhere that authenticated; a
    // daemon that was not running is no reason to leave it enabled.
    env.report(ReportItem::info(ReportMessage::ServiceActionStarted {
        service: QDEVICE_SERVICE.to_string(),
        action: ServiceAction::Stop,
        nodes: labels(&authed),
    }));
    env.execute(
        &authed,
        &QdeviceClientService {
            action: ServiceAction::Stop,
        },
    )
    .await;
    env.check()?;

    env.report(ReportItem::info(ReportMessage::ServiceActionStarted {
        service: QDEVICE_SERVICE.to_string(),
        action: ServiceAction::Disable,
        nodes: labels(&authed),
    }));
    env.execute(
        &authed,
        &QdeviceClientService {
            action: ServiceAction::Disable,
        },
    )
    .await;
    env.check()?;
    Ok(())
}
