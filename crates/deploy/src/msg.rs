//! Instantiate, execute and query messages understood by the Margined contracts.
//!
//! Amounts and ratios are carried as decimal strings, matching the `Uint128`
//! JSON encoding of the contracts.

use serde::{Deserialize, Serialize};

/// Instantiate message of the insurance fund. The fund takes no parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuranceFundInitMsg {}

/// Instantiate message of the fee pool. The pool takes no parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePoolInitMsg {}

/// Instantiate message of the mock price feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeedInitMsg {
    pub decimals: u8,
    pub oracle_hub_contract: String,
}

/// Instantiate message of a vAMM.
///
/// `pricefeed` stays empty in the static profile and is filled in from the
/// registry on the run's working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VammInitMsg {
    pub decimals: u8,
    pub pricefeed: String,
    pub quote_asset: String,
    pub base_asset: String,
    pub quote_asset_reserve: String,
    pub base_asset_reserve: String,
    pub funding_period: u64,
    pub toll_ratio: String,
    pub spread_ratio: String,
    pub fluctuation_limit_ratio: String,
}

/// Instantiate message of the margin engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInitMsg {
    pub decimals: u8,
    pub insurance_fund: String,
    pub fee_pool: String,
    pub eligible_collateral: String,
    pub initial_margin_ratio: String,
    pub maintenance_margin_ratio: String,
    pub liquidation_fee: String,
    pub vamm: Vec<String>,
}

/// Initial balance of a cw20 token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cw20Coin {
    pub address: String,
    pub amount: String,
}

/// Instantiate message of the margined USD cw20 token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cw20InitMsg {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub initial_balances: Vec<Cw20Coin>,
}

/// Execute messages sent to the vAMM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VammExecuteMsg {
    UpdateConfig {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        margin_engine: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pricefeed: Option<String>,
    },
    SetOpen {
        open: bool,
    },
}

/// Execute messages sent to the insurance fund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsuranceFundExecuteMsg {
    UpdateConfig {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        beneficiary: Option<String>,
    },
    AddVamm {
        vamm: String,
    },
}

/// Query messages sent to the vAMM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VammQueryMsg {
    Config {},
    State {},
}
