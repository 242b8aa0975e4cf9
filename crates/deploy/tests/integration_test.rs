//! Integration tests for margined-deploy.
//!
//! These tests drive the full deployment pipeline against the in-memory
//! [`MockChainClient`], with real artifact files and manifests written to a
//! temporary directory.
//! Run with: cargo test --test integration_test

use std::path::PathBuf;

use anyhow::Result;
use margined_deploy::{
    ContractName, DeployError, Deployer, DeployerBuilder, DeploymentManifest, Identity,
    MANIFEST_FILENAME, MockCall, MockChainClient, RecordingReporter, RunStatus, StepOutcome,
    profile::ConfigurationProfile,
};
use serde_json::{Value, json};
use strum::IntoEnumIterator;
use tempdir::TempDir;

/// Test setup context: an artifacts directory holding every contract and an
/// output directory for the manifest.
struct TestContext {
    _dir: TempDir,
    artifacts: PathBuf,
    outdata: PathBuf,
}

impl TestContext {
    fn new(test_prefix: &str) -> Self {
        let dir = TempDir::new(&format!("margined-{test_prefix}")).unwrap();
        let artifacts = dir.path().join("artifacts");
        let outdata = dir.path().join("out");

        std::fs::create_dir_all(&artifacts).unwrap();
        for contract in ContractName::iter() {
            std::fs::write(
                artifacts.join(format!("{}.wasm", contract.artifact())),
                b"\0asm",
            )
            .unwrap();
        }

        Self {
            _dir: dir,
            artifacts,
            outdata,
        }
    }

    fn build_deployer(&self, chain_id: &str) -> Result<Deployer> {
        DeployerBuilder::new(chain_id)
            .artifacts_dir(&self.artifacts)
            .outdata_path(&self.outdata)
            .build()
    }

    fn manifest(&self) -> DeploymentManifest {
        DeploymentManifest::load_or_default(&self.outdata.join(MANIFEST_FILENAME)).unwrap()
    }
}

fn identity() -> Identity {
    Identity::from_key("test1")
}

/// Pretty print an error with its sources, as the binary does.
fn render(err: DeployError) -> String {
    format!("{:#}", anyhow::Error::from(err))
}

#[tokio::test]
async fn test_local_deployment_end_to_end() {
    let ctx = TestContext::new("e2e");
    let deployer = ctx.build_deployer("localterra").unwrap();
    let mut client = MockChainClient::new("A").with_query_response(json!({ "open": true }));
    let reporter = RecordingReporter::new();

    let report = deployer
        .run(
            &ConfigurationProfile::local(),
            &mut client,
            &identity(),
            &reporter,
        )
        .await
        .unwrap();

    let calls = client.calls();
    assert_eq!(calls.len(), 7);

    assert_eq!(
        calls[0],
        MockCall::Deploy {
            artifact: "margined_insurance_fund".to_string(),
            init_msg: json!({}),
            label: "margined-insurance_fund".to_string(),
        }
    );

    let MockCall::Deploy { artifact, init_msg, .. } = &calls[1] else {
        panic!("expected a deploy, got {:?}", calls[1]);
    };
    assert_eq!(artifact, "mock_pricefeed");
    assert_eq!(init_msg, &json!({ "decimals": 6, "oracle_hub_contract": "" }));

    let MockCall::Deploy { artifact, init_msg, .. } = &calls[2] else {
        panic!("expected a deploy, got {:?}", calls[2]);
    };
    assert_eq!(artifact, "margined_vamm");
    assert_eq!(init_msg["pricefeed"], "A2");
    assert_eq!(init_msg["quote_asset"], "USDC");
    assert_eq!(init_msg["base_asset"], "ETH");

    let MockCall::Deploy { artifact, init_msg, .. } = &calls[3] else {
        panic!("expected a deploy, got {:?}", calls[3]);
    };
    assert_eq!(artifact, "margined_engine");
    assert_eq!(init_msg["insurance_fund"], "A1");
    assert_eq!(init_msg["fee_pool"], "A1");
    assert_eq!(init_msg["vamm"], json!(["A3"]));
    assert_eq!(init_msg["eligible_collateral"], "uusd");

    assert_eq!(
        calls[4],
        MockCall::Execute {
            contract: "A3".to_string(),
            msg: json!({ "update_config": { "margin_engine": "A4" } }),
        }
    );
    assert_eq!(
        calls[5],
        MockCall::Execute {
            contract: "A3".to_string(),
            msg: json!({ "set_open": { "open": true } }),
        }
    );
    assert_eq!(
        calls[6],
        MockCall::Query {
            contract: "A3".to_string(),
            msg: json!({ "state": {} }),
        }
    );

    // The state snapshot is reported verbatim.
    assert_eq!(report.vamm_state, Some(json!({ "open": true })));
    let entries = reporter.entries();
    assert_eq!(entries.last().unwrap().1, StepOutcome::Queried(json!({ "open": true })));

    let addresses: Vec<(ContractName, &str)> = report
        .contracts
        .iter()
        .map(|record| (record.name, record.address.as_str()))
        .collect();
    assert_eq!(
        addresses,
        vec![
            (ContractName::InsuranceFund, "A1"),
            (ContractName::PriceFeed, "A2"),
            (ContractName::Vamm, "A3"),
            (ContractName::Engine, "A4"),
        ]
    );
}

#[tokio::test]
async fn test_testnet_deployment_wires_fee_pool_and_insurance_fund() {
    let ctx = TestContext::new("testnet");
    let deployer = ctx.build_deployer("bombay-12").unwrap();
    let mut client = MockChainClient::new("T");

    let report = deployer
        .run(
            &ConfigurationProfile::testnet(),
            &mut client,
            &identity(),
            &RecordingReporter::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.address_of(ContractName::FeePool), Some("T2"));
    assert_eq!(report.address_of(ContractName::Engine), Some("T5"));

    let MockCall::Deploy { init_msg, .. } = &client.calls()[4] else {
        panic!("expected the engine deploy");
    };
    assert_eq!(init_msg["insurance_fund"], "T1");
    assert_eq!(init_msg["fee_pool"], "T2");

    let executes: Vec<(String, Value)> = client
        .calls()
        .iter()
        .filter_map(|call| match call {
            MockCall::Execute { contract, msg } => Some((contract.clone(), msg.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        executes,
        vec![
            ("T4".to_string(), json!({ "update_config": { "margin_engine": "T5" } })),
            ("T1".to_string(), json!({ "add_vamm": { "vamm": "T4" } })),
            ("T1".to_string(), json!({ "update_config": { "beneficiary": "T5" } })),
            ("T4".to_string(), json!({ "set_open": { "open": true } })),
        ]
    );
}

#[tokio::test]
async fn test_failed_vamm_deploy_stops_the_run() {
    let ctx = TestContext::new("vamm-failure");
    let deployer = ctx.build_deployer("localterra").unwrap();
    let mut client = MockChainClient::new("A").failing_deploy("margined_vamm");
    let reporter = RecordingReporter::new();

    let err = deployer
        .run(
            &ConfigurationProfile::local(),
            &mut client,
            &identity(),
            &reporter,
        )
        .await
        .unwrap_err();

    assert_eq!(err.step_label(), Some("Deploy vAMM"));
    assert!(matches!(
        err,
        DeployError::Deployment { contract: ContractName::Vamm, .. }
    ));
    assert!(render(err).contains("rejected by mock chain"));

    // No engine deploy or execute was attempted.
    assert_eq!(client.calls().len(), 3);
    assert!(!client.calls().iter().any(|call| matches!(
        call,
        MockCall::Deploy { artifact, .. } if artifact == "margined_engine"
    )));

    let entries = reporter.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2].0, "Deploy vAMM");
    assert!(matches!(entries[2].1, StepOutcome::Failed(_)));

    // The manifest keeps what was deployed before the failure.
    let manifest = ctx.manifest();
    let local = manifest.network("local").unwrap();
    assert_eq!(local.status, RunStatus::Failed);
    assert_eq!(local.contracts.len(), 2);
}

#[tokio::test]
async fn test_failed_execute_names_step_and_contract() {
    let ctx = TestContext::new("execute-failure");
    let deployer = ctx.build_deployer("localterra").unwrap();
    let mut client = MockChainClient::new("A").failing_execute("set_open");

    let err = deployer
        .run(
            &ConfigurationProfile::local(),
            &mut client,
            &identity(),
            &RecordingReporter::new(),
        )
        .await
        .unwrap_err();

    match &err {
        DeployError::Execution {
            label, address, ..
        } => {
            assert_eq!(label, "Set vAMM Open");
            assert_eq!(address, "A3");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(render(err).contains("unauthorized"));

    // The query never ran.
    assert!(!client.calls().iter().any(|call| matches!(call, MockCall::Query { .. })));
}

#[tokio::test]
async fn test_failed_query_does_not_fail_the_run() {
    let ctx = TestContext::new("query-failure");
    let deployer = ctx.build_deployer("localterra").unwrap();
    let mut client = MockChainClient::new("A").failing_queries();
    let reporter = RecordingReporter::new();

    let report = deployer
        .run(
            &ConfigurationProfile::local(),
            &mut client,
            &identity(),
            &reporter,
        )
        .await
        .unwrap();

    assert!(report.vamm_state.is_none());
    assert_eq!(report.contracts.len(), 4);
    let (label, outcome) = reporter.entries().pop().unwrap();
    assert_eq!(label, "Query vAMM state");
    assert!(matches!(outcome, StepOutcome::QueryFailed(message) if message.contains("Query vAMM state")));
    assert_eq!(ctx.manifest().network("local").unwrap().status, RunStatus::Completed);
}

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let ctx = TestContext::new("idempotence");
    let deployer = ctx.build_deployer("localterra").unwrap();
    let profile = ConfigurationProfile::local();

    let mut first = MockChainClient::new("A");
    let first_reporter = RecordingReporter::new();
    deployer
        .run(&profile, &mut first, &identity(), &first_reporter)
        .await
        .unwrap();

    let mut second = MockChainClient::new("A");
    let second_reporter = RecordingReporter::new();
    deployer
        .run(&profile, &mut second, &identity(), &second_reporter)
        .await
        .unwrap();

    let labels = |reporter: &RecordingReporter| -> Vec<String> {
        reporter.entries().into_iter().map(|(label, _)| label).collect()
    };
    assert_eq!(labels(&first_reporter), labels(&second_reporter));
    assert_eq!(first.calls(), second.calls());

    // The static profile never sees injected addresses.
    assert_eq!(profile, ConfigurationProfile::local());
    assert!(profile.vamm_init_msg.pricefeed.is_empty());
    assert!(profile.engine_init_msg.vamm.is_empty());
}

#[tokio::test]
async fn test_manifest_preserves_other_networks() {
    let ctx = TestContext::new("manifest");

    let testnet = ctx.build_deployer("bombay-12").unwrap();
    testnet
        .run(
            &ConfigurationProfile::testnet(),
            &mut MockChainClient::new("T"),
            &identity(),
            &RecordingReporter::new(),
        )
        .await
        .unwrap();

    let local = ctx.build_deployer("localterra").unwrap();
    local
        .run(
            &ConfigurationProfile::local(),
            &mut MockChainClient::new("A"),
            &identity(),
            &RecordingReporter::new(),
        )
        .await
        .unwrap();

    let manifest = ctx.manifest();
    let testnet_entry = manifest.network("testnet").unwrap();
    assert_eq!(testnet_entry.chain_id, "bombay-12");
    assert_eq!(testnet_entry.contracts.len(), 5);
    assert_eq!(
        testnet_entry.profile_fingerprint,
        ConfigurationProfile::testnet().fingerprint()
    );

    let local_entry = manifest.network("local").unwrap();
    assert_eq!(local_entry.status, RunStatus::Completed);
    assert_eq!(local_entry.contracts[3].name, ContractName::Engine);
    assert_eq!(local_entry.contracts[3].address, "A4");
}

#[tokio::test]
async fn test_missing_artifact_is_a_configuration_error() {
    let ctx = TestContext::new("missing-artifact");
    std::fs::remove_file(ctx.artifacts.join("margined_engine.wasm")).unwrap();
    let deployer = ctx.build_deployer("localterra").unwrap();
    let mut client = MockChainClient::new("A");

    let err = deployer
        .run(
            &ConfigurationProfile::local(),
            &mut client,
            &identity(),
            &RecordingReporter::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(&err, DeployError::Configuration(message) if message.contains("margined_engine.wasm")));
    assert!(client.calls().is_empty());
    assert!(ctx.manifest().network("local").is_none());
}

#[tokio::test]
async fn test_corrupt_manifest_stops_before_any_call() {
    let ctx = TestContext::new("corrupt-manifest");
    let deployer = ctx.build_deployer("localterra").unwrap();
    let manifest_path = ctx.outdata.join(MANIFEST_FILENAME);
    std::fs::write(&manifest_path, "not json").unwrap();
    let mut client = MockChainClient::new("A");

    let err = deployer
        .run(
            &ConfigurationProfile::local(),
            &mut client,
            &identity(),
            &RecordingReporter::new(),
        )
        .await
        .unwrap_err();

    match &err {
        DeployError::Manifest { path, .. } => {
            assert_eq!(path.file_name().unwrap(), MANIFEST_FILENAME)
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains(MANIFEST_FILENAME));
    assert!(client.calls().is_empty());

    // The broken file is left as it was.
    assert_eq!(std::fs::read_to_string(&manifest_path).unwrap(), "not json");
}
