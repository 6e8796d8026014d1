use tracing::{debug, warn};

use super::types::{
    AllocationMix, DepletionResult, DepletionTrace, DepletionYear, ReturnAssumptions,
    WithdrawalPlan,
};

/// Allocation-weighted average return in percent. Callers must check
/// [`AllocationMix::is_complete`] first; an incomplete mix is not normalised.
pub fn blended_return(allocation: &AllocationMix, returns: &ReturnAssumptions) -> f64 {
    allocation
        .0
        .iter()
        .map(|(bucket, weight)| weight * returns.rate_for(bucket) / 100.0)
        .sum()
}

pub fn simulate_depletion(
    starting_corpus: f64,
    annual_expense: f64,
    allocation: &AllocationMix,
    returns: &ReturnAssumptions,
    inflation_percent: f64,
    max_years: u32,
    withdrawal_rate_percent: f64,
) -> DepletionResult {
    simulate_depletion_trace(
        starting_corpus,
        WithdrawalPlan::resolve(annual_expense, withdrawal_rate_percent),
        allocation,
        returns,
        inflation_percent,
        max_years,
    )
    .result
}

pub fn simulate_depletion_trace(
    starting_corpus: f64,
    plan: WithdrawalPlan,
    allocation: &AllocationMix,
    returns: &ReturnAssumptions,
    inflation_percent: f64,
    max_years: u32,
) -> DepletionTrace {
    if !allocation.is_complete() {
        warn!(
            total = allocation.total(),
            "allocation weights do not sum to 100; skipping depletion simulation"
        );
        return DepletionTrace::default();
    }

    let blended_return_percent = blended_return(allocation, returns);
    let initial_withdrawal = plan.initial_withdrawal(starting_corpus);

    let mut fund = starting_corpus;
    let mut withdrawal = initial_withdrawal;
    let mut years_elapsed = 0u32;
    let mut years = Vec::new();

    while fund > 0.0 && years_elapsed < max_years {
        let opening_fund = fund;
        fund -= withdrawal;
        if fund <= 0.0 {
            years.push(DepletionYear {
                year: years_elapsed + 1,
                opening_fund,
                withdrawal,
                closing_fund: fund,
            });
            break;
        }
        fund *= 1.0 + blended_return_percent / 100.0;
        years.push(DepletionYear {
            year: years_elapsed + 1,
            opening_fund,
            withdrawal,
            closing_fund: fund,
        });
        withdrawal *= 1.0 + inflation_percent / 100.0;
        years_elapsed += 1;
    }

    let result = DepletionResult {
        years_sustained: years_elapsed,
        can_sustain_to_horizon: years_elapsed >= max_years && fund > 0.0,
    };
    debug!(
        years_sustained = result.years_sustained,
        can_sustain = result.can_sustain_to_horizon,
        blended_return_percent,
        "depletion simulation complete"
    );

    DepletionTrace {
        result,
        blended_return_percent,
        initial_withdrawal,
        years,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn balanced_mix() -> (AllocationMix, ReturnAssumptions) {
        (
            AllocationMix::from_pairs([("equity", 60.0), ("fds", 30.0), ("cash", 10.0)]),
            ReturnAssumptions::from_pairs([("equity", 12.0), ("fds", 7.0), ("cash", 3.0)]),
        )
    }

    #[test]
    fn blended_return_weights_each_bucket() {
        let (mix, returns) = balanced_mix();
        assert_close(blended_return(&mix, &returns), 7.2 + 2.1 + 0.3, 1e-9);
    }

    #[test]
    fn missing_return_assumption_counts_as_zero() {
        let mix = AllocationMix::from_pairs([("equity", 50.0), ("gold", 50.0)]);
        let returns = ReturnAssumptions::from_pairs([("equity", 10.0)]);
        assert_close(blended_return(&mix, &returns), 5.0, 1e-9);
    }

    #[test]
    fn zero_corpus_with_expenses_cannot_retire() {
        let (mix, returns) = balanced_mix();
        let result = simulate_depletion(0.0, 500_000.0, &mix, &returns, 6.0, 30, 0.0);
        assert_eq!(result.years_sustained, 0);
        assert!(!result.can_sustain_to_horizon);
    }

    #[test]
    fn terminal_year_is_not_counted_or_grown() {
        let mix = AllocationMix::from_pairs([("cash", 100.0)]);
        let returns = ReturnAssumptions::from_pairs([("cash", 10.0)]);
        // 250 -> 150 -> 165 -> 65 -> 71.5 -> exhausted
        let trace = simulate_depletion_trace(
            250.0,
            WithdrawalPlan::FixedAmount(100.0),
            &mix,
            &returns,
            0.0,
            10,
        );
        assert_eq!(trace.result.years_sustained, 2);
        assert!(!trace.result.can_sustain_to_horizon);
        assert_eq!(trace.years.len(), 3);
        assert_close(trace.years[1].closing_fund, 71.5, 1e-9);
        assert_close(trace.years[2].closing_fund, -28.5, 1e-9);
    }

    #[test]
    fn withdrawal_inflates_each_year() {
        let mix = AllocationMix::from_pairs([("cash", 100.0)]);
        let returns = ReturnAssumptions::from_pairs([("cash", 0.0)]);
        let trace = simulate_depletion_trace(
            10_000.0,
            WithdrawalPlan::FixedAmount(1_000.0),
            &mix,
            &returns,
            10.0,
            3,
        );
        let withdrawals: Vec<f64> = trace.years.iter().map(|y| y.withdrawal).collect();
        assert_close(withdrawals[0], 1_000.0, 1e-9);
        assert_close(withdrawals[1], 1_100.0, 1e-9);
        assert_close(withdrawals[2], 1_210.0, 1e-9);
        assert!(trace.result.can_sustain_to_horizon);
        assert_eq!(trace.result.years_sustained, 3);
    }

    #[test]
    fn withdrawal_rate_takes_precedence_over_fixed_expense() {
        let mix = AllocationMix::from_pairs([("cash", 100.0)]);
        let returns = ReturnAssumptions::from_pairs([("cash", 0.0)]);
        // 4% of 1000 is 40 a year: 25 years would be needed to exhaust.
        let result = simulate_depletion(1_000.0, 900.0, &mix, &returns, 0.0, 20, 4.0);
        assert_eq!(result.years_sustained, 20);
        assert!(result.can_sustain_to_horizon);

        let fixed = simulate_depletion(1_000.0, 900.0, &mix, &returns, 0.0, 20, 0.0);
        assert_eq!(fixed.years_sustained, 1);
        assert!(!fixed.can_sustain_to_horizon);
    }

    #[test]
    fn zero_horizon_with_funds_is_sustainable() {
        let (mix, returns) = balanced_mix();
        let result = simulate_depletion(1_000_000.0, 1.0, &mix, &returns, 6.0, 0, 0.0);
        assert_eq!(result.years_sustained, 0);
        assert!(result.can_sustain_to_horizon);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_incomplete_allocation_never_sustains(
            corpus in 0.0f64..1e9,
            expense in 0.0f64..1e7,
            equity in 0u32..91,
            equity_return in -10.0f64..30.0,
            inflation in 0.0f64..12.0,
            max_years in 0u32..60,
            rate in 0.0f64..10.0
        ) {
            let mix = AllocationMix::from_pairs([
                ("equity", equity as f64),
                ("bonds", 90.0 - equity as f64),
            ]);
            let returns = ReturnAssumptions::from_pairs([
                ("equity", equity_return),
                ("bonds", 6.0),
            ]);
            let result = simulate_depletion(corpus, expense, &mix, &returns, inflation, max_years, rate);
            prop_assert_eq!(result.years_sustained, 0);
            prop_assert!(!result.can_sustain_to_horizon);
        }

        #[test]
        fn prop_years_sustained_never_exceeds_horizon(
            corpus in 0.0f64..1e8,
            expense in 1.0f64..1e6,
            ret in -20.0f64..20.0,
            inflation in 0.0f64..10.0,
            max_years in 0u32..80
        ) {
            let mix = AllocationMix::from_pairs([("equity", 100.0)]);
            let returns = ReturnAssumptions::from_pairs([("equity", ret)]);
            let result = simulate_depletion(corpus, expense, &mix, &returns, inflation, max_years, 0.0);
            prop_assert!(result.years_sustained <= max_years);
        }
    }
}
