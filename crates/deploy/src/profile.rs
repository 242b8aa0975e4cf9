//! Static per-network configuration profiles.
//!
//! A profile holds every instantiate message template used by a deployment,
//! plus the topology choices that differ between networks. Profiles are never
//! mutated: a run clones the profile and fills addresses into its copy.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    DeployError, DeployResult,
    msg::{
        Cw20InitMsg, EngineInitMsg, FeePoolInitMsg, InsuranceFundInitMsg, PriceFeedInitMsg,
        VammInitMsg,
    },
};

/// Name of the local development profile.
pub const LOCAL: &str = "local";
/// Name of the remote testnet profile.
pub const TESTNET: &str = "testnet";

/// Shared decimal precision of the Margined contracts.
const DECIMALS: u8 = 6;
/// Initial margin, maintenance margin and liquidation fee ratio (5%).
const DEFAULT_RATIO: &str = "50000";
/// One hour, in seconds.
const FUNDING_PERIOD: u64 = 3_600;

/// Bech32 character set, used to validate contract addresses.
const BECH32_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Where the margin engine sends its fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeePoolTopology {
    /// No fee pool is deployed; the insurance fund receives fees.
    SharedWithInsuranceFund,
    /// A dedicated fee pool contract is deployed.
    Dedicated,
}

/// Network-specific wiring choices of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topology {
    pub fee_pool: FeePoolTopology,
    /// Register the vAMM in the insurance fund after the engine is deployed.
    pub registers_vamm_with_insurance_fund: bool,
    /// Set the margin engine as the insurance fund's beneficiary.
    pub registers_beneficiary: bool,
}

/// Everything needed to build the payloads of one network's deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationProfile {
    /// Profile name (`local`, `testnet`).
    pub network: String,
    /// Human-readable address prefix of the target chain.
    pub bech32_prefix: String,
    /// Collateral accepted by the margin engine: a native denom or a cw20 address.
    pub eligible_collateral: String,
    pub topology: Topology,

    pub insurance_fund_init_msg: InsuranceFundInitMsg,
    pub fee_pool_init_msg: FeePoolInitMsg,
    pub price_feed_init_msg: PriceFeedInitMsg,
    pub vamm_init_msg: VammInitMsg,
    pub engine_init_msg: EngineInitMsg,
    pub cw20_init_msg: Cw20InitMsg,
}

/// Look up the static profile of a network.
pub fn profile_for(network: &str) -> DeployResult<ConfigurationProfile> {
    match network {
        LOCAL => Ok(ConfigurationProfile::local()),
        TESTNET => Ok(ConfigurationProfile::testnet()),
        other => Err(DeployError::Configuration(format!(
            "no configuration profile for network '{other}' (expected '{LOCAL}' or '{TESTNET}')"
        ))),
    }
}

impl ConfigurationProfile {
    /// LocalTerra: the insurance fund doubles as fee pool and no extra wiring is done.
    pub fn local() -> Self {
        Self {
            network: LOCAL.to_string(),
            bech32_prefix: "terra".to_string(),
            eligible_collateral: "uusd".to_string(),
            topology: Topology {
                fee_pool: FeePoolTopology::SharedWithInsuranceFund,
                registers_vamm_with_insurance_fund: false,
                registers_beneficiary: false,
            },
            ..Self::base()
        }
    }

    /// Bombay testnet: dedicated fee pool, vAMM tracked by the insurance fund
    /// and the engine set as its beneficiary.
    pub fn testnet() -> Self {
        Self {
            network: TESTNET.to_string(),
            bech32_prefix: "terra".to_string(),
            eligible_collateral: "uusd".to_string(),
            topology: Topology {
                fee_pool: FeePoolTopology::Dedicated,
                registers_vamm_with_insurance_fund: true,
                registers_beneficiary: true,
            },
            ..Self::base()
        }
    }

    fn base() -> Self {
        Self {
            network: String::new(),
            bech32_prefix: String::new(),
            eligible_collateral: String::new(),
            topology: Topology {
                fee_pool: FeePoolTopology::SharedWithInsuranceFund,
                registers_vamm_with_insurance_fund: false,
                registers_beneficiary: false,
            },
            insurance_fund_init_msg: InsuranceFundInitMsg {},
            fee_pool_init_msg: FeePoolInitMsg {},
            price_feed_init_msg: PriceFeedInitMsg {
                decimals: DECIMALS,
                oracle_hub_contract: String::new(),
            },
            vamm_init_msg: VammInitMsg {
                decimals: DECIMALS,
                pricefeed: String::new(),
                quote_asset: "USDC".to_string(),
                base_asset: "ETH".to_string(),
                quote_asset_reserve: "1200000000000".to_string(),
                base_asset_reserve: "1000000000".to_string(),
                funding_period: FUNDING_PERIOD,
                toll_ratio: "0".to_string(),
                spread_ratio: "0".to_string(),
                fluctuation_limit_ratio: "0".to_string(),
            },
            engine_init_msg: EngineInitMsg {
                decimals: DECIMALS,
                insurance_fund: String::new(),
                fee_pool: String::new(),
                eligible_collateral: String::new(),
                initial_margin_ratio: DEFAULT_RATIO.to_string(),
                maintenance_margin_ratio: DEFAULT_RATIO.to_string(),
                liquidation_fee: DEFAULT_RATIO.to_string(),
                vamm: Vec::new(),
            },
            cw20_init_msg: Cw20InitMsg {
                name: "margined_usd".to_string(),
                symbol: "musd".to_string(),
                decimals: DECIMALS,
                initial_balances: Vec::new(),
            },
        }
    }

    /// Check that every field the pipeline relies on is populated.
    ///
    /// Address fields filled in during a run must still be empty here.
    pub fn validate(&self) -> DeployResult<()> {
        let mut problems = Vec::new();

        if self.network.is_empty() {
            problems.push("network name is empty".to_string());
        }
        if let Err(reason) = validate_collateral(&self.eligible_collateral, &self.bech32_prefix) {
            problems.push(reason);
        }

        let feed = &self.price_feed_init_msg;
        if feed.decimals == 0 {
            problems.push("price_feed_init_msg.decimals must be positive".to_string());
        }

        let vamm = &self.vamm_init_msg;
        if vamm.decimals == 0 {
            problems.push("vamm_init_msg.decimals must be positive".to_string());
        }
        if !vamm.pricefeed.is_empty() {
            problems.push("vamm_init_msg.pricefeed must be left empty in the profile".to_string());
        }
        for (field, value) in [
            ("quote_asset", &vamm.quote_asset),
            ("base_asset", &vamm.base_asset),
        ] {
            if value.is_empty() {
                problems.push(format!("vamm_init_msg.{field} is empty"));
            }
        }
        for (field, value) in [
            ("quote_asset_reserve", &vamm.quote_asset_reserve),
            ("base_asset_reserve", &vamm.base_asset_reserve),
        ] {
            match value.parse::<u128>() {
                Ok(0) => problems.push(format!("vamm_init_msg.{field} must be non-zero")),
                Ok(_) => {}
                Err(_) => problems.push(format!("vamm_init_msg.{field} is not an amount: '{value}'")),
            }
        }
        for (field, value) in [
            ("toll_ratio", &vamm.toll_ratio),
            ("spread_ratio", &vamm.spread_ratio),
            ("fluctuation_limit_ratio", &vamm.fluctuation_limit_ratio),
        ] {
            if value.parse::<u128>().is_err() {
                problems.push(format!("vamm_init_msg.{field} is not a ratio: '{value}'"));
            }
        }
        if vamm.funding_period == 0 {
            problems.push("vamm_init_msg.funding_period must be positive".to_string());
        }

        let engine = &self.engine_init_msg;
        if engine.decimals == 0 {
            problems.push("engine_init_msg.decimals must be positive".to_string());
        }
        for (field, value) in [
            ("initial_margin_ratio", &engine.initial_margin_ratio),
            ("maintenance_margin_ratio", &engine.maintenance_margin_ratio),
            ("liquidation_fee", &engine.liquidation_fee),
        ] {
            if value.parse::<u128>().is_err() {
                problems.push(format!("engine_init_msg.{field} is not a ratio: '{value}'"));
            }
        }
        if !engine.insurance_fund.is_empty() || !engine.fee_pool.is_empty() || !engine.vamm.is_empty()
        {
            problems.push("engine_init_msg contract references must be left empty in the profile".to_string());
        }

        if problems.is_empty() {
            return Ok(());
        }

        Err(DeployError::Configuration(format!(
            "profile '{}' is invalid: {}",
            self.network,
            problems.join("; ")
        )))
    }

    /// SHA-256 fingerprint of the profile, hex encoded.
    ///
    /// Two runs built from equal profiles report the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let json =
            serde_json::to_string(self).expect("ConfigurationProfile serialization should never fail");

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Accept a native denom (`uusd`) or a bech32 contract address of the chain.
fn validate_collateral(collateral: &str, prefix: &str) -> Result<(), String> {
    if collateral.is_empty() {
        return Err("eligible_collateral is empty".to_string());
    }

    let address_hrp = format!("{prefix}1");
    if !prefix.is_empty() && collateral.starts_with(&address_hrp) {
        let data = &collateral[address_hrp.len()..];
        let valid = (38..=90).contains(&collateral.len())
            && data.chars().all(|c| BECH32_CHARSET.contains(c));
        return if valid {
            Ok(())
        } else {
            Err(format!("eligible_collateral '{collateral}' is not a valid {prefix} address"))
        };
    }

    let is_denom = collateral.starts_with('u')
        && (3..=128).contains(&collateral.len())
        && collateral
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if is_denom {
        Ok(())
    } else {
        Err(format!(
            "eligible_collateral '{collateral}' is neither a native denom nor a {prefix} address"
        ))
    }
}
