use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::records::lenient_f64;

pub const ALLOCATION_SUM_TOLERANCE: f64 = 1e-9;

/// Upper bound for every age and year count; keeps each simulation loop short.
pub const MAX_AGE: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialProfile {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    pub inflation_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileIssue {
    RetirementBeforeCurrentAge,
    LifeExpectancyBeforeRetirement,
}

impl FinancialProfile {
    pub fn check(&self) -> Vec<ProfileIssue> {
        let mut issues = Vec::new();
        if self.retirement_age < self.current_age {
            issues.push(ProfileIssue::RetirementBeforeCurrentAge);
        }
        if self.life_expectancy < self.retirement_age {
            issues.push(ProfileIssue::LifeExpectancyBeforeRetirement);
        }
        issues
    }

    pub fn years_to_retirement(&self) -> u32 {
        self.retirement_age.saturating_sub(self.current_age)
    }

    pub fn years_in_retirement(&self) -> u32 {
        self.life_expectancy.saturating_sub(self.retirement_age)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationMix(pub BTreeMap<String, f64>);

impl AllocationMix {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn is_complete(&self) -> bool {
        (self.total() - 100.0).abs() <= ALLOCATION_SUM_TOLERANCE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReturnAssumptions(pub BTreeMap<String, f64>);

impl ReturnAssumptions {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn rate_for(&self, bucket: &str) -> f64 {
        self.0.get(bucket).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeStreams {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub salary: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rental: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub other: f64,
}

impl IncomeStreams {
    pub fn total(self) -> f64 {
        self.salary + self.rental + self.other
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outflows {
    /// Escalates with expense inflation every year after the first.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub variable_expenses: f64,
    /// Loan EMIs, insurance premiums and similar; never escalates.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fixed_outflows: f64,
}

impl Outflows {
    pub fn total(self) -> f64 {
        self.variable_expenses + self.fixed_outflows
    }
}

/// Business rules the projection applies on top of the user's inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectionRules {
    pub rental_growth_percent: f64,
    /// Last age at which new savings are routed into the growth bucket.
    pub growth_allocation_max_age: u32,
    /// Age at which the whole growth bucket is swept into fixed income.
    pub derisk_age: u32,
}

impl Default for ProjectionRules {
    fn default() -> Self {
        Self {
            rental_growth_percent: 5.0,
            growth_allocation_max_age: 55,
            derisk_age: 56,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionInputs {
    pub current_age: u32,
    pub horizon_age: u32,
    pub income: IncomeStreams,
    pub outflows: Outflows,
    pub income_growth_percent: f64,
    pub expense_growth_percent: f64,
    pub growth_allocation_percent: f64,
    pub growth_return_percent: f64,
    pub fixed_return_percent: f64,
    pub rules: ProjectionRules,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionYear {
    pub year: u32,
    pub age: u32,
    pub savings: f64,
    pub growth_bucket_growth: f64,
    pub fixed_bucket_growth: f64,
    pub growth_bucket_balance: f64,
    pub fixed_bucket_balance: f64,
    pub total_outflow: f64,
    pub accumulated_corpus: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub yearly_records: Vec<ProjectionYear>,
    pub final_corpus: f64,
    pub final_annual_expense: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum WithdrawalPlan {
    FixedAmount(f64),
    RatePercent(f64),
}

impl WithdrawalPlan {
    /// A positive withdrawal rate takes precedence over the fixed expense.
    pub fn resolve(annual_expense: f64, withdrawal_rate_percent: f64) -> Self {
        if withdrawal_rate_percent > 0.0 {
            WithdrawalPlan::RatePercent(withdrawal_rate_percent)
        } else {
            WithdrawalPlan::FixedAmount(annual_expense)
        }
    }

    pub fn initial_withdrawal(self, starting_corpus: f64) -> f64 {
        match self {
            WithdrawalPlan::FixedAmount(amount) => amount,
            WithdrawalPlan::RatePercent(rate) => starting_corpus * rate / 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepletionYear {
    pub year: u32,
    pub opening_fund: f64,
    pub withdrawal: f64,
    pub closing_fund: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepletionResult {
    pub years_sustained: u32,
    pub can_sustain_to_horizon: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepletionTrace {
    pub result: DepletionResult,
    pub blended_return_percent: f64,
    pub initial_withdrawal: f64,
    pub years: Vec<DepletionYear>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_check_reports_each_out_of_order_age() {
        let profile = FinancialProfile {
            current_age: 50,
            retirement_age: 45,
            life_expectancy: 40,
            inflation_percent: 6.0,
        };
        assert_eq!(
            profile.check(),
            vec![
                ProfileIssue::RetirementBeforeCurrentAge,
                ProfileIssue::LifeExpectancyBeforeRetirement,
            ]
        );
        assert_eq!(profile.years_to_retirement(), 0);
        assert_eq!(profile.years_in_retirement(), 0);
    }

    #[test]
    fn allocation_completeness_uses_tolerance() {
        let mix = AllocationMix::from_pairs([("equity", 33.3), ("fds", 33.3), ("cash", 33.4)]);
        assert!(mix.is_complete());
        assert!(!AllocationMix::from_pairs([("equity", 99.0)]).is_complete());
    }

    #[test]
    fn rate_withdrawal_beats_fixed_expense() {
        assert_eq!(
            WithdrawalPlan::resolve(500.0, 4.0),
            WithdrawalPlan::RatePercent(4.0)
        );
        assert_eq!(
            WithdrawalPlan::resolve(500.0, 0.0).initial_withdrawal(10_000.0),
            500.0
        );
        assert_eq!(
            WithdrawalPlan::RatePercent(4.0).initial_withdrawal(10_000.0),
            400.0
        );
    }
}
