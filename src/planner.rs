use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::core::{
    CorpusSource, DepletionTrace, FinancialProfile, ProfileIssue, ProjectionInputs,
    ProjectionResult, ProjectionRules, WithdrawalPlan, project_accumulation, starting_corpus,
    simulate_depletion_trace,
};
use crate::records::{
    ASSET_CATEGORIES_KEY, AssetCategoriesSheet, NET_WORTH_KEY, NetWorthSheet, RETIREMENT_KEY,
    RetirementSheet,
};
use crate::store::{KeyValueStore, StoreEvent, load_or_default};

const WATCHED_KEYS: [&str; 3] = [RETIREMENT_KEY, NET_WORTH_KEY, ASSET_CATEGORIES_KEY];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementReport {
    pub profile: FinancialProfile,
    pub profile_issues: Vec<ProfileIssue>,
    pub corpus_source: CorpusSource,
    pub starting_corpus: f64,
    pub annual_expense: f64,
    pub max_years: u32,
    pub projection: ProjectionResult,
    pub depletion: DepletionTrace,
}

pub struct RetirementPlanner {
    store: Arc<dyn KeyValueStore>,
    rules: ProjectionRules,
    cached: Mutex<Option<RetirementReport>>,
}

impl RetirementPlanner {
    pub fn new(store: Arc<dyn KeyValueStore>, rules: ProjectionRules) -> Self {
        Self {
            store,
            rules,
            cached: Mutex::new(None),
        }
    }

    /// Store reads happen outside the cache lock; a report computed while
    /// another write lands may be cached once and is dropped by the next
    /// notification for that key.
    pub fn report(&self) -> RetirementReport {
        if let Some(report) = self.cache().as_ref() {
            return report.clone();
        }
        let report = self.compute();
        *self.cache() = Some(report.clone());
        report
    }

    pub fn invalidate(&self) {
        *self.cache() = None;
    }

    fn cache(&self) -> MutexGuard<'_, Option<RetirementReport>> {
        match self.cached.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn observe(&self, event: &StoreEvent) -> bool {
        let relevant = WATCHED_KEYS.contains(&event.key.as_str());
        if relevant {
            debug!(key = %event.key, "retirement inputs changed");
            self.invalidate();
        }
        relevant
    }

    pub async fn watch(self: Arc<Self>, mut events: broadcast::Receiver<StoreEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.observe(&event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed store notifications; recomputing");
                    self.invalidate();
                }
                Err(RecvError::Closed) => {
                    info!("store notifications closed; planner watch stopped");
                    return;
                }
            }
        }
    }

    pub fn compute(&self) -> RetirementReport {
        let sheet: RetirementSheet = load_or_default(self.store.as_ref(), RETIREMENT_KEY);
        let net_worth: NetWorthSheet = load_or_default(self.store.as_ref(), NET_WORTH_KEY);
        let categories: AssetCategoriesSheet =
            load_or_default(self.store.as_ref(), ASSET_CATEGORIES_KEY);
        build_report(&sheet, &net_worth, &categories, self.rules)
    }
}

pub fn build_report(
    sheet: &RetirementSheet,
    net_worth: &NetWorthSheet,
    categories: &AssetCategoriesSheet,
    rules: ProjectionRules,
) -> RetirementReport {
    let profile = sheet.profile();
    let profile_issues = profile.check();
    if !profile_issues.is_empty() {
        warn!(?profile_issues, "retirement profile ages are out of order");
    }

    let projection = match sheet.corpus_source {
        CorpusSource::Now => ProjectionResult::default(),
        CorpusSource::Future => project_accumulation(&ProjectionInputs {
            current_age: profile.current_age,
            horizon_age: profile.retirement_age,
            income: sheet.income,
            outflows: sheet.outflows,
            income_growth_percent: sheet.income_growth_percent,
            expense_growth_percent: profile.inflation_percent,
            growth_allocation_percent: sheet.growth_allocation_percent,
            growth_return_percent: sheet.growth_return_percent,
            fixed_return_percent: sheet.fixed_return_percent,
            rules,
        }),
    };

    let corpus = starting_corpus(
        sheet.corpus_source,
        &net_worth.assets,
        profile.years_to_retirement(),
        projection.final_corpus,
    );

    let annual_expense = if sheet.annual_expense > 0.0 {
        sheet.annual_expense
    } else {
        match sheet.corpus_source {
            CorpusSource::Now => sheet.outflows.total(),
            CorpusSource::Future => projection.final_annual_expense,
        }
    };

    let first_retired_age = match sheet.corpus_source {
        CorpusSource::Now => profile.current_age,
        CorpusSource::Future => profile.retirement_age,
    };
    let max_years = profile.life_expectancy.saturating_sub(first_retired_age);

    let depletion = simulate_depletion_trace(
        corpus,
        WithdrawalPlan::resolve(annual_expense, sheet.withdrawal_rate_percent),
        &categories.allocation,
        &categories.returns,
        profile.inflation_percent,
        max_years,
    );

    RetirementReport {
        profile,
        profile_issues,
        corpus_source: sheet.corpus_source,
        starting_corpus: corpus,
        annual_expense,
        max_years,
        projection,
        depletion,
    }
}
