//! End-to-end operation scenarios: validate, fan out, commit, and every way
//! a run is allowed to degrade or must abort.

mod support;

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use capstan::ops::{fencing, qdevice, quorum, sbd};
use capstan::ops::fencing::FenceLevelSpec;
use capstan::ops::sbd::SbdEnableRequest;
use capstan::reports::{ForceCode, Severity};
use capstan::validate::options_from;

use support::{
    agent_ok, failed_output, inventory, remote_error, ScriptedRunner, ScriptedTransport,
};

const EXPORT: &str = "cluster-cfg export";
const IMPORT: &str = "cluster-cfg import";

fn plain_doc(version: u64) -> String {
    format!(
        r#"{{"config_version": {version}, "quorum": {{"options": {{"wait_for_all": "0"}}}}, "sbd": {{"enabled": true, "options": {{"SBD_STARTMODE": "clean"}}}}}}"#
    )
}

#[tokio::test]
async fn disable_sbd_skips_the_offline_node_and_commits() {
    let transport = ScriptedTransport::new();
    transport.agents_ok();
    transport.node_down("n2");
    // A cluster with SBD on and a watchdog fence device per node, plus one
    // unrelated IPMI device that must survive the disable.
    let doc = r#"{
        "config_version": 7,
        "quorum": {"options": {"wait_for_all": "0"}},
        "sbd": {"enabled": true, "options": {"SBD_STARTMODE": "clean"}},
        "fencing": {
            "devices": [
                {"id": "watchdog_n1", "agent": "fence_sbd"},
                {"id": "watchdog_n2", "agent": "fence_sbd"},
                {"id": "watchdog_n3", "agent": "fence_sbd"},
                {"id": "fence_ipmi_n1", "agent": "fence_ipmilan"}
            ],
            "levels": [
                {"level": 1, "target": "n1", "devices": ["fence_ipmi_n1"]},
                {"level": 2, "target": "n1", "devices": ["watchdog_n1"]}
            ]
        }
    }"#;
    let runner = ScriptedRunner::new().reply(EXPORT, doc);
    let calls = runner.calls_handle();
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &["n1", "n2", "n3"], None),
        support::skip_offline(),
    );

    let outcome = sbd::disable_sbd(&mut env).await;
    assert!(!outcome.is_aborted());

    // n2 dropped out at the auth step and was never contacted again.
    assert_eq!(transport.routes_for("n2"), vec!["remote/check_auth"]);
    for node in ["n1", "n3"] {
        assert_eq!(
            transport.routes_for(node),
            vec![
                "remote/check_auth",
                "remote/sbd_set_watchdog",
                "remote/sbd_disable"
            ]
        );
    }

    // The committed document lost its SBD section and the watchdog fence
    // devices, took a version bump, and kept the IPMI device.
    let calls = calls.lock().unwrap();
    let (_, stdin) = calls
        .iter()
        .find(|(argv, _)| argv == IMPORT)
        .expect("the config import ran");
    let body = stdin.as_deref().expect("import reads the document on stdin");
    assert!(body.contains("\"config_version\":8"));
    assert!(!body.contains("\"sbd\""));
    assert!(!body.contains("fence_sbd"));
    assert!(!body.contains("watchdog_n2"));
    assert!(body.contains("fence_ipmi_n1"));

    // The offline node shows up as a warning, and the run closes on the
    // restart notice.
    let entries = env.reports.entries();
    assert!(entries
        .iter()
        .any(|e| e.code == "NODE_CONNECTION_ERROR" && e.severity == Severity::Warning));
    assert_eq!(entries.last().unwrap().code, "CLUSTER_RESTART_REQUIRED");
}

#[tokio::test]
async fn an_offline_node_without_skip_offline_aborts_before_any_change() {
    let transport = ScriptedTransport::new();
    transport.agents_ok();
    transport.node_down("n2");
    let runner = ScriptedRunner::new().reply(EXPORT, &plain_doc(7));
    let calls = runner.calls_handle();
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &["n1", "n2", "n3"], None),
        support::strict(),
    );

    let outcome = sbd::disable_sbd(&mut env).await;
    assert!(outcome.is_aborted());

    // Auth ran everywhere, nothing else did, and the document never moved.
    for node in ["n1", "n2", "n3"] {
        assert_eq!(transport.routes_for(node), vec!["remote/check_auth"]);
    }
    assert!(calls.lock().unwrap().is_empty());

    let entries = env.reports.entries();
    let connect = entries
        .iter()
        .find(|e| e.code == "NODE_CONNECTION_ERROR")
        .expect("connect failure reported");
    assert_eq!(connect.severity, Severity::Error);
    assert_eq!(connect.force_code, Some(ForceCode::SkipOffline));
}

#[tokio::test]
async fn sbd_enable_validation_failure_stops_all_node_traffic() {
    let transport = ScriptedTransport::new();
    transport.agents_ok();
    let runner = ScriptedRunner::new();
    let calls = runner.calls_handle();
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &["n1", "n2"], None),
        support::strict(),
    );

    let request = SbdEnableRequest {
        options: options_from([("SBD_BOGUS", "1")]),
        watchdog_by_node: BTreeMap::new(),
    };
    let outcome = sbd::enable_sbd(&mut env, request).await;

    assert!(outcome.is_aborted());
    assert!(transport.sent().is_empty());
    assert!(calls.lock().unwrap().is_empty());
    assert!(env.reports.entries().iter().any(|e| e.code == "INVALID_OPTIONS"));
}

#[tokio::test]
async fn forcing_a_validation_error_lets_the_operation_run() {
    let transport = ScriptedTransport::new();
    transport.agents_ok();
    let runner = ScriptedRunner::new().reply(EXPORT, &plain_doc(3));
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &["n1", "n2"], None),
        support::forced(),
    );

    let request = SbdEnableRequest {
        options: options_from([("SBD_BOGUS", "1"), ("SBD_STARTMODE", "clean")]),
        watchdog_by_node: BTreeMap::from([("n2".to_string(), "/dev/watchdog1".to_string())]),
    };
    let outcome = sbd::enable_sbd(&mut env, request).await;
    assert!(!outcome.is_aborted());

    // The unknown name arrives as a warning now.
    let invalid = env
        .reports
        .entries()
        .into_iter()
        .find(|e| e.code == "INVALID_OPTIONS")
        .expect("forced validation item kept");
    assert_eq!(invalid.severity, Severity::Warning);

    // Each node gets its own watchdog device in the config payload.
    let n1_config = &transport.payloads_for("n1", "remote/sbd_set_config")[0];
    assert_eq!(n1_config["config"]["SBD_WATCHDOG_DEV"], "/dev/watchdog");
    let n2_config = &transport.payloads_for("n2", "remote/sbd_set_config")[0];
    assert_eq!(n2_config["config"]["SBD_WATCHDOG_DEV"], "/dev/watchdog1");
}

#[tokio::test]
async fn losing_the_whole_cluster_aborts_despite_skip_offline() {
    let transport = ScriptedTransport::new();
    transport.node_down("n1");
    transport.node_down("n2");
    let runner = ScriptedRunner::new();
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &["n1", "n2"], None),
        support::skip_offline(),
    );

    let outcome = sbd::disable_sbd(&mut env).await;

    assert!(outcome.is_aborted());
    for node in ["n1", "n2"] {
        assert_eq!(transport.routes_for(node), vec!["remote/check_auth"]);
    }
    assert!(env
        .reports
        .entries()
        .iter()
        .any(|e| e.code == "UNABLE_TO_PERFORM_OPERATION_ON_ANY_NODE"));
}

#[tokio::test]
async fn a_failed_commit_is_reported_and_nothing_is_rolled_back() {
    let transport = ScriptedTransport::new();
    transport.agents_ok();
    let runner = ScriptedRunner::new()
        .reply(EXPORT, &plain_doc(7))
        .reply_with(IMPORT, failed_output(1, "version conflict"));
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &["n1", "n2"], None),
        support::strict(),
    );

    let outcome = sbd::disable_sbd(&mut env).await;
    assert!(outcome.is_aborted());

    let entries = env.reports.entries();
    let failure = entries
        .iter()
        .find(|e| e.code == "CLUSTER_CONFIG_PUSH_FAILED")
        .expect("commit failure reported");
    assert_eq!(failure.payload["reason"], "version conflict");

    // The remote side effects happened and stay: the full disable sequence
    // ran on every node, with no compensating traffic afterwards.
    for node in ["n1", "n2"] {
        assert_eq!(
            transport.routes_for(node),
            vec![
                "remote/check_auth",
                "remote/sbd_set_watchdog",
                "remote/sbd_disable"
            ]
        );
    }
}

#[tokio::test]
async fn quorum_update_distributes_everywhere_then_commits() {
    let transport = ScriptedTransport::new();
    transport.agents_ok();
    let runner = ScriptedRunner::new().reply(EXPORT, &plain_doc(1));
    let calls = runner.calls_handle();
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &["n1", "n2"], None),
        support::strict(),
    );

    let options = options_from([("auto_tie_breaker", "on"), ("wait_for_all", "")]);
    let outcome = quorum::update_options(&mut env, options).await;
    assert!(!outcome.is_aborted());

    // Both nodes received the full rendered document, with the boolean in
    // canonical form and the removed option gone.
    for node in ["n1", "n2"] {
        let payloads = transport.payloads_for(node, "remote/set_cluster_conf");
        assert_eq!(payloads.len(), 1);
        let config = payloads[0]["config"].as_str().expect("rendered document");
        assert!(config.contains(r#""auto_tie_breaker":"1""#));
        assert!(!config.contains("wait_for_all"));
    }

    let calls = calls.lock().unwrap();
    let (_, stdin) = calls.iter().find(|(argv, _)| argv == IMPORT).expect("import ran");
    assert!(stdin.as_deref().unwrap().contains("\"config_version\":2"));
}

#[tokio::test]
async fn quorum_update_refuses_to_leave_part_of_the_cluster_behind() {
    let transport = ScriptedTransport::new();
    transport.agents_ok();
    transport.node_down("n2");
    let runner = ScriptedRunner::new().reply(EXPORT, &plain_doc(1));
    let calls = runner.calls_handle();
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &["n1", "n2"], None),
        support::skip_offline(),
    );

    let options = options_from([("auto_tie_breaker", "on")]);
    let outcome = quorum::update_options(&mut env, options).await;

    assert!(outcome.is_aborted());
    assert!(transport
        .sent()
        .iter()
        .all(|request| request.route != "remote/set_cluster_conf"));
    assert!(calls.lock().unwrap().iter().all(|(argv, _)| argv != IMPORT));

    // The report names exactly the node that blocked the update.
    let entries = env.reports.entries();
    let blocked = entries
        .iter()
        .find(|e| e.code == "CLUSTER_CONFIG_DISTRIBUTION_NODES_UNAVAILABLE")
        .expect("distribution refusal reported");
    assert_eq!(blocked.severity, Severity::Error);
    assert_eq!(blocked.force_code, None);
    assert_eq!(blocked.payload["nodes"], serde_json::json!(["n2"]));
}

#[tokio::test]
async fn a_node_that_drops_after_auth_still_blocks_the_config_push() {
    let transport = ScriptedTransport::new();
    transport.agents_ok();
    // n2 answers the auth check, then refuses every later connection.
    transport.answer("n2", "remote/check_auth", agent_ok());
    transport.node_down("n2");
    let runner = ScriptedRunner::new().reply(EXPORT, &plain_doc(1));
    let calls = runner.calls_handle();
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &["n1", "n2"], None),
        support::skip_offline(),
    );

    let outcome = quorum::update_options(&mut env, options_from([("wait_for_all", "1")])).await;

    assert!(outcome.is_aborted());
    // n2 was asked to take the document and never did, so nothing landed
    // locally either.
    assert_eq!(
        transport.routes_for("n2"),
        vec!["remote/check_auth", "remote/set_cluster_conf"]
    );
    assert!(calls.lock().unwrap().iter().all(|(argv, _)| argv != IMPORT));

    let entries = env.reports.entries();
    assert!(entries
        .iter()
        .any(|e| e.code == "NODE_CONNECTION_ERROR" && e.severity == Severity::Warning));
    let blocked = entries
        .iter()
        .find(|e| e.code == "CLUSTER_CONFIG_DISTRIBUTION_NODES_UNAVAILABLE")
        .expect("distribution shortfall reported");
    assert_eq!(blocked.severity, Severity::Error);
    assert_eq!(blocked.force_code, None);
    assert_eq!(blocked.payload["nodes"], serde_json::json!(["n2"]));
}

#[tokio::test]
async fn an_empty_inventory_aborts_instead_of_committing_locally() {
    let transport = ScriptedTransport::new();
    let runner = ScriptedRunner::new().reply(EXPORT, &plain_doc(1));
    let calls = runner.calls_handle();
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &[], None),
        support::skip_offline(),
    );

    let outcome = sbd::disable_sbd(&mut env).await;

    assert!(outcome.is_aborted());
    assert!(transport.sent().is_empty());
    assert!(calls.lock().unwrap().is_empty());
    assert!(env
        .reports
        .entries()
        .iter()
        .any(|e| e.code == "UNABLE_TO_PERFORM_OPERATION_ON_ANY_NODE"));
}

#[tokio::test]
async fn qdevice_certificate_setup_walks_the_whole_chain() {
    let ca_cert = BASE64.encode(b"ca certificate der");
    let signed_cert = BASE64.encode(b"signed certificate der");

    let transport = ScriptedTransport::new();
    transport.agents_ok();
    transport.answer(
        "arbiter",
        "remote/qdevice_net_get_ca_certificate",
        support::success(&ca_cert),
    );
    transport.answer(
        "arbiter",
        "remote/qdevice_net_sign_node_certificate",
        support::success(&signed_cert),
    );
    let runner = ScriptedRunner::new()
        .reply("qdevice-net-certutil -r -n prod", "CERT-REQ\n")
        .reply("qdevice-net-certutil -M -c -", "PK12-BLOB\n");
    let calls = runner.calls_handle();
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &["n1", "n2"], Some("arbiter")),
        support::strict(),
    );

    let outcome = qdevice::setup_client_certificates(&mut env).await;
    assert!(!outcome.is_aborted());

    // The qnetd host only ever sees the CA fetch and the signing request.
    assert_eq!(
        transport.routes_for("arbiter"),
        vec![
            "remote/qdevice_net_get_ca_certificate",
            "remote/qdevice_net_sign_node_certificate"
        ]
    );
    // Cluster nodes get storage init and the final import.
    for node in ["n1", "n2"] {
        assert_eq!(
            transport.routes_for(node),
            vec![
                "remote/check_auth",
                "remote/qdevice_net_client_init_certificate_storage",
                "remote/qdevice_net_client_import_certificate"
            ]
        );
        let import = &transport.payloads_for(node, "remote/qdevice_net_client_import_certificate")[0];
        assert_eq!(import["certificate"], "PK12-BLOB");
    }

    // The signing request carried the generated CSR and the cluster name.
    let sign = &transport.payloads_for("arbiter", "remote/qdevice_net_sign_node_certificate")[0];
    assert_eq!(sign["certificate_request"], "CERT-REQ");
    assert_eq!(sign["cluster_name"], "prod");

    // The signed blob went through the local converter on stdin.
    let calls = calls.lock().unwrap();
    let (_, stdin) = calls
        .iter()
        .find(|(argv, _)| argv == "qdevice-net-certutil -M -c -")
        .expect("conversion ran");
    assert_eq!(stdin.as_deref(), Some(signed_cert.as_str()));

    let entries = env.reports.entries();
    assert_eq!(
        entries
            .iter()
            .filter(|e| e.code == "QDEVICE_CERTIFICATE_ACCEPTED_BY_NODE")
            .count(),
        2
    );
}

#[tokio::test]
async fn qdevice_setup_continues_on_the_reduced_set_after_a_node_drops() {
    let ca_cert = BASE64.encode(b"ca certificate der");
    let signed_cert = BASE64.encode(b"signed certificate der");

    let transport = ScriptedTransport::new();
    transport.agents_ok();
    // n2 answers the auth check, then falls off the network.
    transport.answer("n2", "remote/check_auth", agent_ok());
    transport.node_down("n2");
    transport.answer(
        "arbiter",
        "remote/qdevice_net_get_ca_certificate",
        support::success(&ca_cert),
    );
    transport.answer(
        "arbiter",
        "remote/qdevice_net_sign_node_certificate",
        support::success(&signed_cert),
    );
    let runner = ScriptedRunner::new()
        .reply("qdevice-net-certutil -r -n prod", "CERT-REQ\n")
        .reply("qdevice-net-certutil -M -c -", "PK12-BLOB\n");
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &["n1", "n2"], Some("arbiter")),
        support::skip_offline(),
    );

    let outcome = qdevice::setup_client_certificates(&mut env).await;
    assert!(!outcome.is_aborted());

    // n2 was tried for storage init, failed, and was left out of the import.
    assert_eq!(
        transport.routes_for("n2"),
        vec![
            "remote/check_auth",
            "remote/qdevice_net_client_init_certificate_storage"
        ]
    );
    assert_eq!(
        transport.routes_for("n1"),
        vec![
            "remote/check_auth",
            "remote/qdevice_net_client_init_certificate_storage",
            "remote/qdevice_net_client_import_certificate"
        ]
    );
    let entries = env.reports.entries();
    assert!(entries
        .iter()
        .any(|e| e.code == "NODE_CONNECTION_ERROR" && e.severity == Severity::Warning));
}

#[tokio::test]
async fn qdevice_setup_requires_a_qnetd_host() {
    let transport = ScriptedTransport::new();
    transport.agents_ok();
    let mut env = support::env(
        &transport,
        ScriptedRunner::new(),
        inventory("prod", &["n1", "n2"], None),
        support::strict(),
    );

    let outcome = qdevice::setup_client_certificates(&mut env).await;

    assert!(outcome.is_aborted());
    assert!(transport.sent().is_empty());
    assert!(env
        .reports
        .entries()
        .iter()
        .any(|e| e.code == "QNETD_HOST_NOT_CONFIGURED"));
}

#[tokio::test]
async fn qdevice_start_failures_are_best_effort_but_enable_failures_are_not() {
    let transport = ScriptedTransport::new();
    transport.agents_ok();
    transport.answer(
        "n2",
        "remote/qdevice_client_start",
        remote_error(409, "already active"),
    );
    let mut env = support::env(
        &transport,
        ScriptedRunner::new(),
        inventory("prod", &["n1", "n2"], None),
        support::strict(),
    );

    let outcome = qdevice::enable_client(&mut env).await;
    assert!(!outcome.is_aborted());

    let start_failure = env
        .reports
        .entries()
        .into_iter()
        .find(|e| e.code == "REMOTE_COMMAND_ERROR")
        .expect("start failure reported");
    assert_eq!(start_failure.severity, Severity::Warning);

    // Same cluster, but the enable step itself fails on n2: that is fatal.
    let transport = ScriptedTransport::new();
    transport.agents_ok();
    transport.answer(
        "n2",
        "remote/qdevice_client_enable",
        remote_error(500, "unit not found"),
    );
    let mut env = support::env(
        &transport,
        ScriptedRunner::new(),
        inventory("prod", &["n1", "n2"], None),
        support::strict(),
    );

    let outcome = qdevice::enable_client(&mut env).await;
    assert!(outcome.is_aborted());
    // The start step never ran anywhere.
    assert!(transport
        .sent()
        .iter()
        .all(|request| request.route != "remote/qdevice_client_start"));
}

#[tokio::test]
async fn fence_levels_validate_against_the_device_index() {
    let export = r#"{
        "config_version": 2,
        "fencing": {
            "devices": [
                {"id": "fence_ipmi_n1", "agent": "fence_ipmilan"},
                {"id": "fence_ipmi_n2", "agent": "fence_ipmilan"}
            ],
            "levels": []
        }
    }"#;

    // Unknown device, strict: forceable error, nothing committed.
    let transport = ScriptedTransport::new();
    let runner = ScriptedRunner::new().reply(EXPORT, export);
    let calls = runner.calls_handle();
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &["n1", "n2"], None),
        support::strict(),
    );
    let spec = FenceLevelSpec {
        level: "1".to_string(),
        target_node: "n1".to_string(),
        devices: vec!["fence_bogus".to_string()],
    };
    let outcome = fencing::set_levels(&mut env, vec![spec]).await;

    assert!(outcome.is_aborted());
    assert!(calls.lock().unwrap().iter().all(|(argv, _)| argv != IMPORT));
    let missing = env
        .reports
        .entries()
        .into_iter()
        .find(|e| e.code == "RESOURCES_NOT_FOUND")
        .expect("missing device reported");
    assert_eq!(missing.force_code, Some(ForceCode::Force));

    // Same spec with --force: the level lands and the document commits.
    let transport = ScriptedTransport::new();
    let runner = ScriptedRunner::new().reply(EXPORT, export);
    let calls = runner.calls_handle();
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &["n1", "n2"], None),
        support::forced(),
    );
    let spec = FenceLevelSpec {
        level: "1".to_string(),
        target_node: "n1".to_string(),
        devices: vec!["fence_bogus".to_string()],
    };
    let outcome = fencing::set_levels(&mut env, vec![spec]).await;

    assert!(!outcome.is_aborted());
    let calls = calls.lock().unwrap();
    let (_, stdin) = calls.iter().find(|(argv, _)| argv == IMPORT).expect("import ran");
    let body = stdin.as_deref().unwrap();
    assert!(body.contains(r#""target":"n1""#));
    assert!(body.contains(r#""fence_bogus""#));
}

#[tokio::test]
async fn clearing_no_levels_commits_nothing() {
    let transport = ScriptedTransport::new();
    let runner = ScriptedRunner::new().reply(EXPORT, r#"{"config_version": 5}"#);
    let calls = runner.calls_handle();
    let mut env = support::env(
        &transport,
        runner,
        inventory("prod", &["n1"], None),
        support::strict(),
    );

    let outcome = fencing::clear_levels(&mut env, None).await;

    assert!(!outcome.is_aborted());
    let calls = calls.lock().unwrap();
    assert!(calls.iter().any(|(argv, _)| argv == EXPORT));
    assert!(calls.iter().all(|(argv, _)| argv != IMPORT));
}
