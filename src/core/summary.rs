use serde::{Deserialize, Serialize};

use super::formulas::{future_value, sip_paying_amount_required};
use crate::records::lenient_f64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default)]
    pub category: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetHolding {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub expected_return_percent: f64,
    #[serde(default)]
    pub liquid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub target_today: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub years: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub expected_return_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorpusSource {
    Now,
    Future,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShare {
    pub category: String,
    pub amount: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetWorthSummary {
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub net_worth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashflowSummary {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_savings: f64,
    pub savings_rate_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalPlan {
    pub name: String,
    pub inflated_target: f64,
    pub monthly_sip: f64,
}

fn percent_of(part: f64, whole: f64) -> f64 {
    if whole == 0.0 { 0.0 } else { part / whole * 100.0 }
}

pub fn category_totals<'a, I>(items: I) -> Vec<CategoryShare>
where
    I: IntoIterator<Item = &'a LineItem>,
{
    let mut shares: Vec<CategoryShare> = Vec::new();
    for item in items {
        match shares.iter_mut().find(|s| s.category == item.category) {
            Some(share) => share.amount += item.amount,
            None => shares.push(CategoryShare {
                category: item.category.clone(),
                amount: item.amount,
                percent: 0.0,
            }),
        }
    }
    let total: f64 = shares.iter().map(|s| s.amount).sum();
    for share in &mut shares {
        share.percent = percent_of(share.amount, total);
    }
    shares
}

pub fn asset_breakdown(assets: &[AssetHolding]) -> Vec<CategoryShare> {
    let items: Vec<LineItem> = assets
        .iter()
        .map(|a| LineItem {
            category: a.name.clone(),
            amount: a.value,
        })
        .collect();
    category_totals(&items)
}

pub fn net_worth(assets: &[AssetHolding], liabilities: &[LineItem]) -> NetWorthSummary {
    let total_assets: f64 = assets.iter().map(|a| a.value).sum();
    let total_liabilities: f64 = liabilities.iter().map(|l| l.amount).sum();
    NetWorthSummary {
        total_assets,
        total_liabilities,
        net_worth: total_assets - total_liabilities,
    }
}

pub fn cashflow_summary(incomes: &[LineItem], expenses: &[LineItem]) -> CashflowSummary {
    let total_income: f64 = incomes.iter().map(|i| i.amount).sum();
    let total_expenses: f64 = expenses.iter().map(|e| e.amount).sum();
    let net_savings = total_income - total_expenses;
    CashflowSummary {
        total_income,
        total_expenses,
        net_savings,
        savings_rate_percent: percent_of(net_savings, total_income),
    }
}

/// Corpus available at the start of retirement. `Future` grows each liquid
/// holding at its own expected return and adds the projected savings corpus.
pub fn starting_corpus(
    source: CorpusSource,
    assets: &[AssetHolding],
    years_to_retirement: u32,
    projected_savings_corpus: f64,
) -> f64 {
    let liquid = assets.iter().filter(|a| a.liquid);
    match source {
        CorpusSource::Now => liquid.map(|a| a.value).sum(),
        CorpusSource::Future => {
            let grown: f64 = liquid
                .map(|a| {
                    future_value(
                        a.value,
                        a.expected_return_percent,
                        years_to_retirement as f64,
                    )
                })
                .sum();
            grown + projected_savings_corpus
        }
    }
}

pub fn goal_plan(goal: &Goal, inflation_percent: f64) -> GoalPlan {
    let inflated_target = future_value(goal.target_today, inflation_percent, goal.years);
    GoalPlan {
        name: goal.name.clone(),
        inflated_target,
        monthly_sip: sip_paying_amount_required(
            inflated_target,
            goal.expected_return_percent,
            goal.years,
        ),
    }
}
