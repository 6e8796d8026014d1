use tracing::debug;

use super::types::{IncomeStreams, Outflows, ProjectionInputs, ProjectionResult, ProjectionYear};

#[derive(Debug, Default)]
struct Buckets {
    growth: f64,
    fixed: f64,
}

impl Buckets {
    fn total(&self) -> f64 {
        self.growth + self.fixed
    }

    fn sweep_growth_into_fixed(&mut self) {
        self.fixed += self.growth;
        self.growth = 0.0;
    }
}

#[derive(Debug, Clone, Copy)]
struct YearFlows {
    income: IncomeStreams,
    outflows: Outflows,
}

impl YearFlows {
    fn escalate(&mut self, inputs: &ProjectionInputs) {
        self.income.salary *= 1.0 + inputs.income_growth_percent / 100.0;
        self.income.rental *= 1.0 + inputs.rules.rental_growth_percent / 100.0;
        self.outflows.variable_expenses *= 1.0 + inputs.expense_growth_percent / 100.0;
    }

    fn savings(self) -> f64 {
        self.income.total() - self.outflows.total()
    }
}

pub fn project_accumulation(inputs: &ProjectionInputs) -> ProjectionResult {
    if inputs.horizon_age < inputs.current_age {
        return ProjectionResult::default();
    }

    let span = inputs.horizon_age - inputs.current_age;
    let mut records = Vec::with_capacity(span as usize + 1);
    let mut buckets = Buckets::default();
    let mut flows = YearFlows {
        income: inputs.income,
        outflows: inputs.outflows,
    };

    for i in 0..=span {
        let age = inputs.current_age + i;
        if i > 0 {
            flows.escalate(inputs);
        }

        if age == inputs.rules.derisk_age {
            debug!(age, swept = buckets.growth, "sweeping growth bucket into fixed income");
            buckets.sweep_growth_into_fixed();
        }

        let savings = flows.savings();
        let growth_share = growth_allocation_for_age(inputs, age) / 100.0;
        buckets.growth += savings * growth_share;
        buckets.fixed += savings * (1.0 - growth_share);

        let growth_bucket_growth = buckets.growth * inputs.growth_return_percent / 100.0;
        let fixed_bucket_growth = buckets.fixed * inputs.fixed_return_percent / 100.0;
        buckets.growth += growth_bucket_growth;
        buckets.fixed += fixed_bucket_growth;

        records.push(ProjectionYear {
            year: i + 1,
            age,
            savings,
            growth_bucket_growth,
            fixed_bucket_growth,
            growth_bucket_balance: buckets.growth,
            fixed_bucket_balance: buckets.fixed,
            total_outflow: flows.outflows.total(),
            accumulated_corpus: buckets.total(),
        });
    }

    let final_annual_expense = flows.outflows.total();
    debug!(
        years = records.len(),
        final_corpus = buckets.total(),
        "projection complete"
    );
    ProjectionResult {
        yearly_records: records,
        final_corpus: buckets.total(),
        final_annual_expense,
    }
}

fn growth_allocation_for_age(inputs: &ProjectionInputs, age: u32) -> f64 {
    if age <= inputs.rules.growth_allocation_max_age {
        inputs.growth_allocation_percent
    } else {
        0.0
    }
}
