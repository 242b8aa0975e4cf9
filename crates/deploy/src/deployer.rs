//! The deployment orchestrator.

use serde_json::Value;

use crate::{
    ArtifactStore, ChainClient, ConfigurationProfile, ContractRegistry, DeployError, DeployResult,
    Identity, Pipeline, PipelineStep,
    manifest::{DeploymentManifest, ManifestTarget, NetworkDeployment, RunStatus},
    pipeline::StepKind,
    reporter::{DeploymentReport, Reporter, StepOutcome, StepReport},
};

/// Runs the deployment pipeline of a profile against a chain client.
///
/// Steps run strictly one after the other; the first failing step stops the
/// run and nothing already deployed is undone. Each run works on its own copy
/// of the profile and its own registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployer {
    /// Where contract artifacts are read from.
    pub artifacts: ArtifactStore,
    /// Manifest written after each deployment, if any.
    pub manifest: Option<ManifestTarget>,
    /// Require every artifact to exist before the first step.
    pub check_artifacts: bool,
}

impl Default for Deployer {
    fn default() -> Self {
        Self {
            artifacts: ArtifactStore::default(),
            manifest: None,
            check_artifacts: true,
        }
    }
}

/// State owned by a single run.
struct Run<'a> {
    profile: &'a ConfigurationProfile,
    fingerprint: String,
    working: ConfigurationProfile,
    registry: ContractRegistry,
    steps: Vec<StepReport>,
    vamm_state: Option<Value>,
}

impl Deployer {
    pub async fn run<C, R>(
        &self,
        profile: &ConfigurationProfile,
        client: &mut C,
        identity: &Identity,
        reporter: &R,
    ) -> DeployResult<DeploymentReport>
    where
        C: ChainClient,
        R: Reporter,
    {
        let pipeline = Pipeline::for_profile(profile);
        self.run_pipeline(&pipeline, profile, client, identity, reporter)
            .await
    }

    /// Run an explicit pipeline. [`Deployer::run`] uses the profile's pipeline.
    pub async fn run_pipeline<C, R>(
        &self,
        pipeline: &Pipeline,
        profile: &ConfigurationProfile,
        client: &mut C,
        identity: &Identity,
        reporter: &R,
    ) -> DeployResult<DeploymentReport>
    where
        C: ChainClient,
        R: Reporter,
    {
        profile.validate()?;
        pipeline.validate()?;
        if self.check_artifacts {
            self.artifacts.ensure_present(pipeline.deployed_contracts())?;
        }
        if let Some(target) = &self.manifest {
            DeploymentManifest::load_or_default(&target.path).map_err(|source| {
                DeployError::Manifest {
                    path: target.path.clone(),
                    source,
                }
            })?;
        }

        let deployer_address = client.account_address(identity).await.map_err(|e| {
            DeployError::Configuration(format!(
                "failed to resolve deployer account '{}': {e:#}",
                identity.key_name()
            ))
        })?;

        tracing::info!(
            network = %profile.network,
            deployer = %deployer_address,
            steps = pipeline.steps().len(),
            "Starting deployment process..."
        );

        let mut run = Run {
            profile,
            fingerprint: profile.fingerprint(),
            working: profile.clone(),
            registry: ContractRegistry::new(),
            steps: Vec::with_capacity(pipeline.steps().len()),
            vamm_state: None,
        };

        for step in pipeline.steps() {
            reporter.step_started(step);

            match self.run_step(step, &mut run, client, identity).await {
                Ok(outcome) => {
                    reporter.report(step, &outcome);
                    run.steps.push(StepReport {
                        label: step.label.clone(),
                        kind: step.kind,
                        outcome,
                    });
                }
                Err(err) => {
                    reporter.report(step, &StepOutcome::Failed(error_chain(&err)));
                    self.persist(&run, RunStatus::Failed);
                    return Err(err);
                }
            }
        }

        self.persist(&run, RunStatus::Completed);

        tracing::info!(
            network = %profile.network,
            contracts = run.registry.len(),
            "✓ Deployment complete!"
        );

        Ok(DeploymentReport {
            network: profile.network.clone(),
            profile_fingerprint: run.fingerprint,
            deployer_address,
            contracts: run.registry.records().to_vec(),
            steps: run.steps,
            vamm_state: run.vamm_state,
        })
    }

    async fn run_step<C: ChainClient>(
        &self,
        step: &PipelineStep,
        run: &mut Run<'_>,
        client: &mut C,
        identity: &Identity,
    ) -> DeployResult<StepOutcome> {
        let payload = step
            .payload
            .render(&mut run.working, &run.registry)
            .map_err(|err| match err {
                DeployError::UnknownContract { name, .. } => DeployError::UnknownContract {
                    name,
                    step: Some(step.label.clone()),
                },
                other => other,
            })?;

        tracing::debug!(label = %step.label, payload = %payload, "Sending step payload");

        match step.kind {
            StepKind::Deploy => {
                let artifact = self.artifacts.path_for(step.contract);
                let deployed = client
                    .deploy(identity, &artifact, &payload, &step.instance_label())
                    .await
                    .map_err(|source| DeployError::Deployment {
                        label: step.label.clone(),
                        contract: step.contract,
                        source,
                    })?;

                let artifact_name = artifact
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default();
                let record = run
                    .registry
                    .record(step.contract, deployed.address, artifact_name, deployed.code_id)?
                    .clone();

                self.persist(run, RunStatus::InProgress);
                Ok(StepOutcome::Deployed(record))
            }
            StepKind::Execute => {
                let address = self.target_address(step, run)?;
                let ack = client
                    .execute(identity, &address, &payload)
                    .await
                    .map_err(|source| DeployError::Execution {
                        label: step.label.clone(),
                        contract: step.contract,
                        address: address.clone(),
                        source,
                    })?;
                Ok(StepOutcome::Executed(ack))
            }
            StepKind::Query => {
                let address = self.target_address(step, run)?;
                match client.query(&address, &payload).await {
                    Ok(snapshot) => {
                        run.vamm_state = Some(snapshot.clone());
                        Ok(StepOutcome::Queried(snapshot))
                    }
                    Err(source) => {
                        // Diagnostic only: a failed query never fails the run.
                        let err = DeployError::Query {
                            label: step.label.clone(),
                            contract: step.contract,
                            address,
                            source,
                        };
                        Ok(StepOutcome::QueryFailed(error_chain(&err)))
                    }
                }
            }
        }
    }

    fn target_address(&self, step: &PipelineStep, run: &Run<'_>) -> DeployResult<String> {
        run.registry
            .resolve(step.contract)
            .map(str::to_string)
            .map_err(|_| DeployError::UnknownContract {
                name: step.contract,
                step: Some(step.label.clone()),
            })
    }

    /// Write the run to the manifest.
    ///
    /// Step outcomes are decided by the chain alone: a write failure after the
    /// pre-flight load is logged and the run goes on.
    fn persist(&self, run: &Run<'_>, status: RunStatus) {
        let Some(target) = &self.manifest else {
            return;
        };

        if let Err(source) = DeploymentManifest::upsert(
            &target.path,
            &run.profile.network,
            NetworkDeployment::new(&target.chain_id, &run.fingerprint, status, &run.registry),
        ) {
            let err = DeployError::Manifest {
                path: target.path.clone(),
                source,
            };
            tracing::warn!(
                %status,
                contracts = run.registry.len(),
                error = %error_chain(&err),
                "Failed to update the deployment manifest"
            );
        }
    }
}

/// Render an error and all its sources on one line.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
