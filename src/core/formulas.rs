pub fn future_value(present_value: f64, annual_rate_percent: f64, years: f64) -> f64 {
    present_value * (1.0 + annual_rate_percent / 100.0).powf(years)
}

pub fn sip_paying_amount_required(
    target_future_value: f64,
    annual_rate_percent: f64,
    years: f64,
) -> f64 {
    if target_future_value <= 0.0 || years <= 0.0 {
        return 0.0;
    }
    let monthly_rate = annual_rate_percent / 100.0 / 12.0;
    let months = years * 12.0;
    if monthly_rate == 0.0 {
        return target_future_value / months;
    }
    target_future_value * (monthly_rate / ((1.0 + monthly_rate).powf(months) - 1.0))
}

pub fn lump_sum_maturity(yearly_investment: f64, annual_rate_percent: f64, years: f64) -> f64 {
    let rate = annual_rate_percent / 100.0;
    if rate == 0.0 {
        return yearly_investment * years;
    }
    yearly_investment * (((1.0 + rate).powf(years) - 1.0) / rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn monthly_accumulation(payment: f64, annual_rate_percent: f64, years: u32) -> f64 {
        let monthly_rate = annual_rate_percent / 100.0 / 12.0;
        let mut balance = 0.0;
        for _ in 0..years * 12 {
            balance = balance * (1.0 + monthly_rate) + payment;
        }
        balance
    }

    #[test]
    fn future_value_compounds_annually() {
        assert_close(future_value(100_000.0, 10.0, 2.0), 121_000.0, 1e-6);
        assert_close(future_value(50_000.0, -10.0, 1.0), 45_000.0, 1e-6);
    }

    #[test]
    fn sip_degenerate_inputs_return_zero() {
        assert_eq!(sip_paying_amount_required(0.0, 12.0, 10.0), 0.0);
        assert_eq!(sip_paying_amount_required(-5.0, 12.0, 10.0), 0.0);
        assert_eq!(sip_paying_amount_required(1_000_000.0, 12.0, 0.0), 0.0);
        assert_eq!(sip_paying_amount_required(1_000_000.0, 12.0, -3.0), 0.0);
    }

    #[test]
    fn sip_zero_rate_spreads_target_linearly() {
        assert_close(sip_paying_amount_required(120_000.0, 0.0, 10.0), 1_000.0, 1e-9);
    }

    #[test]
    fn lump_sum_maturity_matches_hand_calculation() {
        // 1000 at the end of each of 3 years at 10%: 1000 + 1100 + 1210.
        assert_close(lump_sum_maturity(1_000.0, 10.0, 3.0), 3_310.0, 1e-6);
        assert_close(lump_sum_maturity(150_000.0, 0.0, 15.0), 2_250_000.0, 1e-6);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_zero_years_leaves_present_value_unchanged(
            present_value in 0.0f64..1e9,
            rate in -50.0f64..50.0
        ) {
            prop_assert!(future_value(present_value, rate, 0.0) == present_value);
        }

        #[test]
        fn prop_zero_rate_leaves_present_value_unchanged(
            present_value in 0.0f64..1e9,
            years in 0u32..80
        ) {
            prop_assert!(future_value(present_value, 0.0, years as f64) == present_value);
        }

        #[test]
        fn prop_sip_payment_reaches_target(
            target in 1_000.0f64..1e8,
            rate in 0.5f64..20.0,
            years in 1u32..40
        ) {
            let payment = sip_paying_amount_required(target, rate, years as f64);
            let reached = monthly_accumulation(payment, rate, years);
            prop_assert!(((reached - target) / target).abs() <= 1e-6);
        }
    }
}
