//! The fixed, ordered list of deployment steps.
//!
//! A [`Pipeline`] is built from a profile's topology. Each [`PipelineStep`]
//! names its target and a [`Payload`]; payloads are rendered only when the step
//! runs, from the run's working profile and the addresses recorded so far.

use serde::Serialize;
use serde_json::Value;

use crate::{
    ContractName, ContractRegistry, DeployError, DeployResult,
    msg::{InsuranceFundExecuteMsg, VammExecuteMsg, VammQueryMsg},
    profile::{ConfigurationProfile, FeePoolTopology},
};

/// What a step does on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepKind {
    Deploy,
    Execute,
    Query,
}

/// The message sent by a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Payload {
    InsuranceFundInit,
    FeePoolInit,
    PriceFeedInit,
    /// vAMM instantiation, with the price feed address injected.
    VammInit,
    /// Engine instantiation. Fees go to `fee_pool`, which is the insurance fund
    /// when the profile shares it.
    EngineInit { fee_pool: ContractName },
    /// `update_config { margin_engine }` on the vAMM.
    VammSetMarginEngine,
    /// `add_vamm { vamm }` on the insurance fund.
    InsuranceFundAddVamm,
    /// `update_config { beneficiary }` on the insurance fund.
    InsuranceFundSetBeneficiary,
    /// `set_open { open: true }` on the vAMM.
    VammSetOpen,
    /// `state {}` query on the vAMM.
    VammState,
}

impl Payload {
    /// Contracts whose addresses the payload embeds.
    pub fn references(&self) -> Vec<ContractName> {
        match self {
            Payload::InsuranceFundInit | Payload::FeePoolInit | Payload::PriceFeedInit => vec![],
            Payload::VammInit => vec![ContractName::PriceFeed],
            Payload::EngineInit { fee_pool } => {
                let mut references = vec![ContractName::InsuranceFund, ContractName::Vamm];
                if !references.contains(fee_pool) {
                    references.push(*fee_pool);
                }
                references
            }
            Payload::VammSetMarginEngine | Payload::InsuranceFundSetBeneficiary => {
                vec![ContractName::Engine]
            }
            Payload::InsuranceFundAddVamm => vec![ContractName::Vamm],
            Payload::VammSetOpen | Payload::VammState => vec![],
        }
    }

    /// Build the JSON message, injecting resolved addresses into `working`.
    pub fn render(
        &self,
        working: &mut ConfigurationProfile,
        registry: &ContractRegistry,
    ) -> DeployResult<Value> {
        let value = match self {
            Payload::InsuranceFundInit => to_value(&working.insurance_fund_init_msg),
            Payload::FeePoolInit => to_value(&working.fee_pool_init_msg),
            Payload::PriceFeedInit => to_value(&working.price_feed_init_msg),
            Payload::VammInit => {
                working.vamm_init_msg.pricefeed =
                    registry.resolve(ContractName::PriceFeed)?.to_string();
                to_value(&working.vamm_init_msg)
            }
            Payload::EngineInit { fee_pool } => {
                let msg = &mut working.engine_init_msg;
                msg.insurance_fund = registry.resolve(ContractName::InsuranceFund)?.to_string();
                msg.fee_pool = registry.resolve(*fee_pool)?.to_string();
                msg.eligible_collateral = working.eligible_collateral.clone();
                msg.vamm = vec![registry.resolve(ContractName::Vamm)?.to_string()];
                to_value(&working.engine_init_msg)
            }
            Payload::VammSetMarginEngine => to_value(&VammExecuteMsg::UpdateConfig {
                owner: None,
                margin_engine: Some(registry.resolve(ContractName::Engine)?.to_string()),
                pricefeed: None,
            }),
            Payload::InsuranceFundAddVamm => to_value(&InsuranceFundExecuteMsg::AddVamm {
                vamm: registry.resolve(ContractName::Vamm)?.to_string(),
            }),
            Payload::InsuranceFundSetBeneficiary => {
                to_value(&InsuranceFundExecuteMsg::UpdateConfig {
                    owner: None,
                    beneficiary: Some(registry.resolve(ContractName::Engine)?.to_string()),
                })
            }
            Payload::VammSetOpen => to_value(&VammExecuteMsg::SetOpen { open: true }),
            Payload::VammState => to_value(&VammQueryMsg::State {}),
        };

        value.map_err(|e| DeployError::Configuration(format!("failed to encode message: {e}")))
    }
}

fn to_value<T: Serialize>(msg: &T) -> serde_json::Result<Value> {
    serde_json::to_value(msg)
}

/// One unit of work of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStep {
    /// Operator-facing description, e.g. `Deploy vAMM`.
    pub label: String,
    pub kind: StepKind,
    /// Contract deployed by the step, or the existing contract it targets.
    pub contract: ContractName,
    pub payload: Payload,
}

impl PipelineStep {
    fn deploy(contract: ContractName, payload: Payload) -> Self {
        Self {
            label: format!("Deploy {}", contract.title()),
            kind: StepKind::Deploy,
            contract,
            payload,
        }
    }

    fn execute(label: &str, contract: ContractName, payload: Payload) -> Self {
        Self {
            label: label.to_string(),
            kind: StepKind::Execute,
            contract,
            payload,
        }
    }

    fn query(label: &str, contract: ContractName, payload: Payload) -> Self {
        Self {
            label: label.to_string(),
            kind: StepKind::Query,
            contract,
            payload,
        }
    }

    /// Every contract that must be recorded before this step runs.
    pub fn dependencies(&self) -> Vec<ContractName> {
        let mut dependencies = self.payload.references();
        if self.kind != StepKind::Deploy && !dependencies.contains(&self.contract) {
            dependencies.insert(0, self.contract);
        }
        dependencies
    }

    /// Label handed to the chain when instantiating the contract.
    pub fn instance_label(&self) -> String {
        format!("margined-{}", self.contract)
    }
}

/// The ordered steps of one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    /// The pipeline of a profile, following its topology flags.
    pub fn for_profile(profile: &ConfigurationProfile) -> Self {
        let topology = &profile.topology;
        let mut steps = vec![PipelineStep::deploy(
            ContractName::InsuranceFund,
            Payload::InsuranceFundInit,
        )];

        let fee_pool = match topology.fee_pool {
            FeePoolTopology::Dedicated => {
                steps.push(PipelineStep::deploy(ContractName::FeePool, Payload::FeePoolInit));
                ContractName::FeePool
            }
            FeePoolTopology::SharedWithInsuranceFund => ContractName::InsuranceFund,
        };

        steps.extend([
            PipelineStep::deploy(ContractName::PriceFeed, Payload::PriceFeedInit),
            PipelineStep::deploy(ContractName::Vamm, Payload::VammInit),
            PipelineStep::deploy(ContractName::Engine, Payload::EngineInit { fee_pool }),
            PipelineStep::execute(
                "Set Margin Engine in vAMM",
                ContractName::Vamm,
                Payload::VammSetMarginEngine,
            ),
        ]);

        if topology.registers_vamm_with_insurance_fund {
            steps.push(PipelineStep::execute(
                "Register vAMM in Insurance Fund",
                ContractName::InsuranceFund,
                Payload::InsuranceFundAddVamm,
            ));
        }
        if topology.registers_beneficiary {
            steps.push(PipelineStep::execute(
                "Set Margin Engine as Insurance Fund beneficiary",
                ContractName::InsuranceFund,
                Payload::InsuranceFundSetBeneficiary,
            ));
        }

        steps.extend([
            PipelineStep::execute("Set vAMM Open", ContractName::Vamm, Payload::VammSetOpen),
            PipelineStep::query("Query vAMM state", ContractName::Vamm, Payload::VammState),
        ]);

        Self { steps }
    }

    /// Build a pipeline from explicit steps.
    pub fn from_steps(steps: Vec<PipelineStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Contracts deployed by the pipeline, in order.
    pub fn deployed_contracts(&self) -> Vec<ContractName> {
        self.steps
            .iter()
            .filter(|step| step.kind == StepKind::Deploy)
            .map(|step| step.contract)
            .collect()
    }

    /// Check that each step only depends on contracts deployed by earlier steps
    /// and that no contract is deployed twice.
    pub fn validate(&self) -> DeployResult<()> {
        let mut deployed: Vec<ContractName> = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            if let Some(missing) = step
                .dependencies()
                .into_iter()
                .find(|dependency| !deployed.contains(dependency))
            {
                return Err(DeployError::UnknownContract {
                    name: missing,
                    step: Some(step.label.clone()),
                });
            }

            if step.kind == StepKind::Deploy {
                if deployed.contains(&step.contract) {
                    return Err(DeployError::Configuration(format!(
                        "step '{}' deploys {} a second time",
                        step.label, step.contract
                    )));
                }
                deployed.push(step.contract);
            }
        }

        Ok(())
    }
}
