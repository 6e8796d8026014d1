use std::collections::BTreeMap;

use clap::Args;
use serde::Deserialize;
use thiserror::Error;

use crate::core::{
    AllocationMix, IncomeStreams, MAX_AGE, Outflows, ProjectionInputs, ProjectionRules,
    ReturnAssumptions, WithdrawalPlan,
};
use crate::records::{lenient_opt_f64, lenient_opt_map, lenient_opt_u32};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),
    #[error("{0} must be > -100")]
    RateTooLow(&'static str),
    #[error("{0} must be between 0 and 100")]
    PercentOutOfRange(&'static str),
    #[error("{0} must be >= 0")]
    Negative(&'static str),
    #[error("{0} must be at most {max}", max = MAX_AGE)]
    AgeOutOfRange(&'static str),
    #[error("invalid bucket {0:?}: expected name=percent")]
    InvalidBucket(String),
}

fn check_finite(name: &'static str, value: f64) -> Result<f64, InputError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InputError::NotFinite(name))
    }
}

fn check_rate(name: &'static str, value: f64) -> Result<f64, InputError> {
    if check_finite(name, value)? <= -100.0 {
        return Err(InputError::RateTooLow(name));
    }
    Ok(value)
}

fn check_percent(name: &'static str, value: f64) -> Result<f64, InputError> {
    if !(0.0..=100.0).contains(&check_finite(name, value)?) {
        return Err(InputError::PercentOutOfRange(name));
    }
    Ok(value)
}

fn check_age(name: &'static str, value: u32) -> Result<u32, InputError> {
    if value > MAX_AGE {
        return Err(InputError::AgeOutOfRange(name));
    }
    Ok(value)
}

fn check_non_negative(name: &'static str, value: f64) -> Result<f64, InputError> {
    if check_finite(name, value)? < 0.0 {
        return Err(InputError::Negative(name));
    }
    Ok(value)
}

pub fn parse_bucket(raw: &str) -> Result<(String, f64), InputError> {
    let invalid = || InputError::InvalidBucket(raw.to_string());
    let (name, value) = raw.split_once('=').ok_or_else(invalid)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid());
    }
    let value = value.trim().parse::<f64>().map_err(|_| invalid())?;
    Ok((name.to_string(), value))
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct RulesArgs {
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Annual rental income escalation in percent"
    )]
    pub rental_growth_rate: f64,
    #[arg(
        long,
        default_value_t = 55,
        help = "Last age at which savings are allocated to the growth bucket"
    )]
    pub growth_allocation_max_age: u32,
    #[arg(
        long,
        default_value_t = 56,
        help = "Age at which the growth bucket is swept into fixed income"
    )]
    pub derisk_age: u32,
}

impl RulesArgs {
    pub fn build(&self) -> Result<ProjectionRules, InputError> {
        Ok(ProjectionRules {
            rental_growth_percent: check_rate("--rental-growth-rate", self.rental_growth_rate)?,
            growth_allocation_max_age: check_age(
                "--growth-allocation-max-age",
                self.growth_allocation_max_age,
            )?,
            derisk_age: check_age("--derisk-age", self.derisk_age)?,
        })
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ProjectionArgs {
    #[arg(long, default_value_t = 30)]
    pub current_age: u32,
    #[arg(long, default_value_t = 60, help = "Last age to project, inclusive")]
    pub horizon_age: u32,
    #[arg(long, default_value_t = 0.0, help = "Annual salary income")]
    pub salary: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual rental income")]
    pub rental_income: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Other annual income; never escalates"
    )]
    pub other_income: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual household expenses")]
    pub variable_expenses: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Annual EMIs and premiums; never escalate"
    )]
    pub fixed_outflows: f64,
    #[arg(
        long,
        default_value_t = 8.0,
        help = "Annual salary growth in percent"
    )]
    pub income_growth_rate: f64,
    #[arg(
        long,
        default_value_t = 6.0,
        help = "Annual expense inflation in percent"
    )]
    pub expense_growth_rate: f64,
    #[arg(
        long,
        default_value_t = 70.0,
        help = "Share of savings put in the growth bucket, in percent"
    )]
    pub growth_allocation: f64,
    #[arg(
        long,
        default_value_t = 12.0,
        help = "Expected growth bucket return in percent"
    )]
    pub growth_return: f64,
    #[arg(
        long,
        default_value_t = 7.0,
        help = "Expected fixed income bucket return in percent"
    )]
    pub fixed_return: f64,
    #[command(flatten)]
    pub rules: RulesArgs,
}

pub fn default_projection_args() -> ProjectionArgs {
    ProjectionArgs {
        current_age: 30,
        horizon_age: 60,
        salary: 1_200_000.0,
        rental_income: 0.0,
        other_income: 0.0,
        variable_expenses: 600_000.0,
        fixed_outflows: 0.0,
        income_growth_rate: 8.0,
        expense_growth_rate: 6.0,
        growth_allocation: 70.0,
        growth_return: 12.0,
        fixed_return: 7.0,
        rules: RulesArgs {
            rental_growth_rate: 5.0,
            growth_allocation_max_age: 55,
            derisk_age: 56,
        },
    }
}

pub fn build_projection_inputs(args: &ProjectionArgs) -> Result<ProjectionInputs, InputError> {
    Ok(ProjectionInputs {
        current_age: check_age("--current-age", args.current_age)?,
        horizon_age: check_age("--horizon-age", args.horizon_age)?,
        income: IncomeStreams {
            salary: check_finite("--salary", args.salary)?,
            rental: check_finite("--rental-income", args.rental_income)?,
            other: check_finite("--other-income", args.other_income)?,
        },
        outflows: Outflows {
            variable_expenses: check_finite("--variable-expenses", args.variable_expenses)?,
            fixed_outflows: check_finite("--fixed-outflows", args.fixed_outflows)?,
        },
        income_growth_percent: check_rate("--income-growth-rate", args.income_growth_rate)?,
        expense_growth_percent: check_rate("--expense-growth-rate", args.expense_growth_rate)?,
        growth_allocation_percent: check_percent("--growth-allocation", args.growth_allocation)?,
        growth_return_percent: check_rate("--growth-return", args.growth_return)?,
        fixed_return_percent: check_rate("--fixed-return", args.fixed_return)?,
        rules: args.rules.build()?,
    })
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct DepletionArgs {
    #[arg(long, help = "Corpus at the start of retirement")]
    pub starting_corpus: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Fixed first-year withdrawal; used when --withdrawal-rate is 0"
    )]
    pub annual_expense: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "First-year withdrawal as percent of the starting corpus"
    )]
    pub withdrawal_rate: f64,
    #[arg(
        long = "allocation",
        value_parser = parse_bucket,
        default_values = ["equity=60", "fds=30", "cash=10"],
        help = "Bucket weight as name=percent; weights must sum to 100"
    )]
    pub allocation: Vec<(String, f64)>,
    #[arg(
        long = "returns",
        value_parser = parse_bucket,
        default_values = ["equity=12", "fds=7", "cash=3.5"],
        help = "Bucket expected return as name=percent"
    )]
    pub returns: Vec<(String, f64)>,
    #[arg(
        long,
        default_value_t = 6.0,
        help = "Annual withdrawal inflation in percent"
    )]
    pub inflation_rate: f64,
    #[arg(long, default_value_t = 30, help = "Years the corpus must last")]
    pub max_years: u32,
}

fn default_allocation() -> Vec<(String, f64)> {
    vec![
        ("equity".to_string(), 60.0),
        ("fds".to_string(), 30.0),
        ("cash".to_string(), 10.0),
    ]
}

fn default_returns() -> Vec<(String, f64)> {
    vec![
        ("equity".to_string(), 12.0),
        ("fds".to_string(), 7.0),
        ("cash".to_string(), 3.5),
    ]
}

pub fn default_depletion_args() -> DepletionArgs {
    DepletionArgs {
        starting_corpus: 30_000_000.0,
        annual_expense: 1_200_000.0,
        withdrawal_rate: 0.0,
        allocation: default_allocation(),
        returns: default_returns(),
        inflation_rate: 6.0,
        max_years: 30,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepletionInputs {
    pub starting_corpus: f64,
    pub plan: WithdrawalPlan,
    pub allocation: AllocationMix,
    pub returns: ReturnAssumptions,
    pub inflation_percent: f64,
    pub max_years: u32,
}

/// Allocation weights are checked for finiteness only; a mix that does not
/// add up to 100 is passed through and reported as unsustainable.
pub fn build_depletion_inputs(args: &DepletionArgs) -> Result<DepletionInputs, InputError> {
    let starting_corpus = check_finite("--starting-corpus", args.starting_corpus)?;
    let annual_expense = check_non_negative("--annual-expense", args.annual_expense)?;
    let withdrawal_rate = check_percent("--withdrawal-rate", args.withdrawal_rate)?;
    for (_, weight) in &args.allocation {
        check_finite("--allocation", *weight)?;
    }
    for (_, rate) in &args.returns {
        check_rate("--returns", *rate)?;
    }
    Ok(DepletionInputs {
        starting_corpus,
        plan: WithdrawalPlan::resolve(annual_expense, withdrawal_rate),
        allocation: AllocationMix::from_pairs(args.allocation.iter().cloned()),
        returns: ReturnAssumptions::from_pairs(args.returns.iter().cloned()),
        inflation_percent: check_rate("--inflation-rate", args.inflation_rate)?,
        max_years: check_age("--max-years", args.max_years)?,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectionPayload {
    #[serde(deserialize_with = "lenient_opt_u32")]
    pub current_age: Option<u32>,
    #[serde(deserialize_with = "lenient_opt_u32")]
    pub horizon_age: Option<u32>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub salary: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub rental_income: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub other_income: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub variable_expenses: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub fixed_outflows: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub income_growth: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub expense_growth: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub growth_allocation: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub growth_return: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub fixed_return: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub rental_growth: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_u32")]
    pub growth_allocation_max_age: Option<u32>,
    #[serde(deserialize_with = "lenient_opt_u32")]
    pub derisk_age: Option<u32>,
}

pub fn projection_args_from_payload(
    payload: ProjectionPayload,
    mut args: ProjectionArgs,
) -> ProjectionArgs {
    if let Some(v) = payload.current_age {
        args.current_age = v;
    }
    if let Some(v) = payload.horizon_age {
        args.horizon_age = v;
    }
    if let Some(v) = payload.salary {
        args.salary = v;
    }
    if let Some(v) = payload.rental_income {
        args.rental_income = v;
    }
    if let Some(v) = payload.other_income {
        args.other_income = v;
    }
    if let Some(v) = payload.variable_expenses {
        args.variable_expenses = v;
    }
    if let Some(v) = payload.fixed_outflows {
        args.fixed_outflows = v;
    }
    if let Some(v) = payload.income_growth {
        args.income_growth_rate = v;
    }
    if let Some(v) = payload.expense_growth {
        args.expense_growth_rate = v;
    }
    if let Some(v) = payload.growth_allocation {
        args.growth_allocation = v;
    }
    if let Some(v) = payload.growth_return {
        args.growth_return = v;
    }
    if let Some(v) = payload.fixed_return {
        args.fixed_return = v;
    }
    if let Some(v) = payload.rental_growth {
        args.rules.rental_growth_rate = v;
    }
    if let Some(v) = payload.growth_allocation_max_age {
        args.rules.growth_allocation_max_age = v;
    }
    if let Some(v) = payload.derisk_age {
        args.rules.derisk_age = v;
    }
    args
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DepletionPayload {
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub starting_corpus: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub annual_expense: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub withdrawal_rate: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_map")]
    pub allocation: Option<BTreeMap<String, f64>>,
    #[serde(deserialize_with = "lenient_opt_map")]
    pub returns: Option<BTreeMap<String, f64>>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub inflation: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_u32")]
    pub max_years: Option<u32>,
}

pub fn depletion_args_from_payload(
    payload: DepletionPayload,
    mut args: DepletionArgs,
) -> DepletionArgs {
    if let Some(v) = payload.starting_corpus {
        args.starting_corpus = v;
    }
    if let Some(v) = payload.annual_expense {
        args.annual_expense = v;
    }
    if let Some(v) = payload.withdrawal_rate {
        args.withdrawal_rate = v;
    }
    if let Some(v) = payload.allocation {
        args.allocation = v.into_iter().collect();
    }
    if let Some(v) = payload.returns {
        args.returns = v.into_iter().collect();
    }
    if let Some(v) = payload.inflation {
        args.inflation_rate = v;
    }
    if let Some(v) = payload.max_years {
        args.max_years = v;
    }
    args
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormulaPayload {
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub present_value: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub target_future_value: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub yearly_investment: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub rate: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub years: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct ProjectionCli {
        #[command(flatten)]
        args: ProjectionArgs,
    }

    #[derive(Parser, Debug)]
    struct DepletionCli {
        #[command(flatten)]
        args: DepletionArgs,
    }

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn cli_defaults_match_rule_defaults() {
        let cli = ProjectionCli::parse_from(["nestplan"]);
        let inputs = build_projection_inputs(&cli.args).expect("valid inputs");
        assert_eq!(inputs.rules, ProjectionRules::default());
        assert_eq!(cli.args.rules, default_projection_args().rules);
    }

    #[test]
    fn build_projection_inputs_rejects_growth_at_minus_hundred() {
        let mut args = default_projection_args();
        args.income_growth_rate = -100.0;
        let err = build_projection_inputs(&args).expect_err("must reject <= -100 growth");
        assert_eq!(err, InputError::RateTooLow("--income-growth-rate"));
        assert!(err.to_string().contains("--income-growth-rate"));
    }

    #[test]
    fn build_projection_inputs_rejects_allocation_over_hundred() {
        let mut args = default_projection_args();
        args.growth_allocation = 120.0;
        let err = build_projection_inputs(&args).expect_err("must reject allocation");
        assert_eq!(err, InputError::PercentOutOfRange("--growth-allocation"));
    }

    #[test]
    fn build_projection_inputs_allows_horizon_before_current_age() {
        let mut args = default_projection_args();
        args.current_age = 50;
        args.horizon_age = 40;
        assert!(build_projection_inputs(&args).is_ok());
    }

    #[test]
    fn projection_payload_overrides_only_given_fields() {
        let json = r#"{
          "currentAge": "35",
          "salary": 900000,
          "variableExpenses": "lots",
          "deriskAge": 60,
          "rentalGrowth": 3
        }"#;
        let payload: ProjectionPayload = serde_json::from_str(json).expect("payload parses");
        let args = projection_args_from_payload(payload, default_projection_args());
        let inputs = build_projection_inputs(&args).expect("valid inputs");

        assert_eq!(inputs.current_age, 35);
        assert_eq!(inputs.horizon_age, 60);
        assert_approx(inputs.income.salary, 900_000.0);
        assert_approx(inputs.outflows.variable_expenses, 0.0);
        assert_eq!(inputs.rules.derisk_age, 60);
        assert_approx(inputs.rules.rental_growth_percent, 3.0);
        assert_approx(inputs.growth_return_percent, 12.0);
    }

    #[test]
    fn parse_bucket_accepts_name_equals_percent() {
        assert_eq!(parse_bucket("equity=60"), Ok(("equity".to_string(), 60.0)));
        assert_eq!(parse_bucket(" fds = 7.5 "), Ok(("fds".to_string(), 7.5)));
        assert!(parse_bucket("equity").is_err());
        assert!(parse_bucket("=5").is_err());
        assert!(parse_bucket("cash=ten").is_err());
    }

    #[test]
    fn depletion_cli_defaults_match_api_defaults() {
        let cli = DepletionCli::parse_from(["nestplan", "--starting-corpus", "30000000"]);
        let defaults = default_depletion_args();
        assert_eq!(cli.args.allocation, defaults.allocation);
        assert_eq!(cli.args.returns, defaults.returns);
    }

    #[test]
    fn depletion_cli_parses_repeated_buckets() {
        let cli = DepletionCli::parse_from([
            "nestplan",
            "--starting-corpus",
            "1000000",
            "--allocation",
            "equity=50",
            "--allocation",
            "bonds=50",
            "--returns",
            "equity=10",
            "--returns",
            "bonds=6",
        ]);
        let inputs = build_depletion_inputs(&cli.args).expect("valid inputs");
        assert!(inputs.allocation.is_complete());
        assert_approx(inputs.returns.rate_for("bonds"), 6.0);
        assert_eq!(inputs.plan, WithdrawalPlan::FixedAmount(0.0));
    }

    #[test]
    fn depletion_payload_keeps_incomplete_allocation() {
        let json = r#"{
          "startingCorpus": 5000000,
          "withdrawalRate": "4",
          "allocation": { "equity": 50, "fds": "40" }
        }"#;
        let payload: DepletionPayload = serde_json::from_str(json).expect("payload parses");
        let args = depletion_args_from_payload(payload, default_depletion_args());
        let inputs = build_depletion_inputs(&args).expect("valid inputs");
        assert!(!inputs.allocation.is_complete());
        assert_approx(inputs.allocation.total(), 90.0);
        assert_eq!(inputs.plan, WithdrawalPlan::RatePercent(4.0));
    }

    #[test]
    fn oversized_horizon_from_payload_is_rejected() {
        let payload: ProjectionPayload =
            serde_json::from_str(r#"{ "currentAge": 0, "horizonAge": 4000000000 }"#)
                .expect("payload parses");
        let args = projection_args_from_payload(payload, default_projection_args());
        let err = build_projection_inputs(&args).expect_err("must reject huge horizon");
        assert_eq!(err, InputError::AgeOutOfRange("--horizon-age"));
        assert!(err.to_string().contains("150"));
    }

    #[test]
    fn rule_ages_above_cap_are_rejected() {
        let mut args = default_projection_args();
        args.rules.derisk_age = MAX_AGE + 1;
        assert_eq!(
            build_projection_inputs(&args),
            Err(InputError::AgeOutOfRange("--derisk-age"))
        );

        args.rules.derisk_age = MAX_AGE;
        args.current_age = MAX_AGE;
        args.horizon_age = MAX_AGE;
        assert!(build_projection_inputs(&args).is_ok());
    }

    #[test]
    fn oversized_max_years_from_payload_is_rejected() {
        let payload: DepletionPayload = serde_json::from_str(
            r#"{ "startingCorpus": 1000, "annualExpense": 0, "maxYears": 4000000000 }"#,
        )
        .expect("payload parses");
        let args = depletion_args_from_payload(payload, default_depletion_args());
        assert_eq!(
            build_depletion_inputs(&args),
            Err(InputError::AgeOutOfRange("--max-years"))
        );
    }

    #[test]
    fn build_depletion_inputs_rejects_negative_expense() {
        let mut args = default_depletion_args();
        args.annual_expense = -1.0;
        let err = build_depletion_inputs(&args).expect_err("must reject");
        assert_eq!(err, InputError::Negative("--annual-expense"));
    }
}
