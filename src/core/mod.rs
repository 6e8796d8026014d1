mod depletion;
mod formulas;
mod projection;
mod summary;
mod types;

pub use depletion::{blended_return, simulate_depletion, simulate_depletion_trace};
pub use formulas::{future_value, lump_sum_maturity, sip_paying_amount_required};
pub use projection::project_accumulation;
pub use summary::{
    AssetHolding, CashflowSummary, CategoryShare, CorpusSource, Goal, GoalPlan, LineItem,
    NetWorthSummary, asset_breakdown, cashflow_summary, category_totals, goal_plan, net_worth,
    starting_corpus,
};
pub use types::{
    AllocationMix, DepletionResult, DepletionTrace, DepletionYear, FinancialProfile,
    IncomeStreams, Outflows, ProfileIssue, ProjectionInputs, ProjectionResult, ProjectionRules,
    MAX_AGE, ProjectionYear, ReturnAssumptions, WithdrawalPlan,
};
