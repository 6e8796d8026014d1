use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::core::{
    AllocationMix, AssetHolding, CorpusSource, FinancialProfile, Goal, IncomeStreams, LineItem,
    MAX_AGE, Outflows, ReturnAssumptions,
};

pub const CASHFLOW_KEY: &str = "cashflow";
pub const NET_WORTH_KEY: &str = "netWorth";
pub const GOALS_KEY: &str = "goals";
pub const RETIREMENT_KEY: &str = "retirement";
pub const ASSET_CATEGORIES_KEY: &str = "assetCategories";

pub fn coerce_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

pub fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_f64(&value))
}

pub fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(|v| coerce_f64(&v)))
}

pub fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(to_age(coerce_f64(&value)))
}

pub fn lenient_opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(|v| to_age(coerce_f64(&v))))
}

fn to_age(value: f64) -> u32 {
    if value <= 0.0 {
        0
    } else {
        value.min(u32::MAX as f64) as u32
    }
}

fn lenient_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw.into_iter().map(|(k, v)| (k, coerce_f64(&v))).collect())
}

pub fn lenient_opt_map<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?;
    Ok(raw.map(|m| m.into_iter().map(|(k, v)| (k, coerce_f64(&v))).collect()))
}

fn lenient_allocation<'de, D>(deserializer: D) -> Result<AllocationMix, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_map(deserializer).map(AllocationMix)
}

fn lenient_returns<'de, D>(deserializer: D) -> Result<ReturnAssumptions, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_map(deserializer).map(ReturnAssumptions)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CashflowSheet {
    pub incomes: Vec<LineItem>,
    pub expenses: Vec<LineItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetWorthSheet {
    pub assets: Vec<AssetHolding>,
    pub liabilities: Vec<LineItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GoalsSheet {
    #[serde(deserialize_with = "lenient_f64")]
    pub inflation_percent: f64,
    pub goals: Vec<Goal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetCategoriesSheet {
    #[serde(deserialize_with = "lenient_allocation")]
    pub allocation: AllocationMix,
    #[serde(deserialize_with = "lenient_returns")]
    pub returns: ReturnAssumptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetirementSheet {
    #[serde(deserialize_with = "lenient_u32")]
    pub current_age: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub retirement_age: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub life_expectancy: u32,
    #[serde(deserialize_with = "lenient_f64")]
    pub inflation_percent: f64,
    pub corpus_source: CorpusSource,
    #[serde(deserialize_with = "lenient_f64")]
    pub annual_expense: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub withdrawal_rate_percent: f64,
    pub income: IncomeStreams,
    pub outflows: Outflows,
    #[serde(deserialize_with = "lenient_f64")]
    pub income_growth_percent: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub growth_allocation_percent: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub growth_return_percent: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub fixed_return_percent: f64,
}

impl Default for RetirementSheet {
    fn default() -> Self {
        Self {
            current_age: 30,
            retirement_age: 60,
            life_expectancy: 85,
            inflation_percent: 6.0,
            corpus_source: CorpusSource::Now,
            annual_expense: 0.0,
            withdrawal_rate_percent: 0.0,
            income: IncomeStreams::default(),
            outflows: Outflows::default(),
            income_growth_percent: 8.0,
            growth_allocation_percent: 70.0,
            growth_return_percent: 12.0,
            fixed_return_percent: 7.0,
        }
    }
}

impl RetirementSheet {
    /// Ages are clamped to [`MAX_AGE`]; a stored sheet can hold any number.
    pub fn profile(&self) -> FinancialProfile {
        FinancialProfile {
            current_age: self.current_age.min(MAX_AGE),
            retirement_age: self.retirement_age.min(MAX_AGE),
            life_expectancy: self.life_expectancy.min(MAX_AGE),
            inflation_percent: self.inflation_percent,
        }
    }
}
