//! margined-deploy - Bootstrap deployment of the Margined perpetuals contracts.
//!
//! This crate deploys and wires the insurance fund, fee pool, mock price feed,
//! vAMM and margin engine contracts on a local or testnet network, one step at
//! a time, and records every deployed address.

mod builder;
pub use builder::{DeployerBuilder, OutDataPath};

mod client;
pub use client::{
    ChainClient, CliChainClient, DeployedContract, ExecuteAck, Identity, MockCall,
    MockChainClient,
};

mod contracts;
pub use contracts::{ARTIFACT_EXTENSION, ArtifactStore, ContractName, DEFAULT_ARTIFACTS_DIR};

mod deployer;
pub use deployer::Deployer;

mod error;
pub use error::{DeployError, DeployResult};

mod fs;

pub mod manifest;
pub use manifest::{DeploymentManifest, MANIFEST_FILENAME, NetworkDeployment, RunStatus};

pub mod msg;

pub mod network;
pub use network::{
    ConfirmationMode, Network, NetworkSelection, NetworkSettings, Secrets, SettingsOverrides,
    select_network,
};

pub mod pipeline;
pub use pipeline::{Payload, Pipeline, PipelineStep, StepKind};

pub mod profile;
pub use profile::{ConfigurationProfile, FeePoolTopology, Topology, profile_for};

mod registry;
pub use registry::{ContractDeploymentRecord, ContractRegistry};

pub mod reporter;
pub use reporter::{
    DeploymentReport, RecordingReporter, Reporter, StepOutcome, StepReport, TracingReporter,
};

mod rpc;
