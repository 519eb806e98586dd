use rayon::prelude::*;

use super::config::{MAX_RUNS, MAX_YEARS};
use super::error::{EngineError, EngineResult, ensure_finite, ensure_non_negative};
use super::rng::{NormalSource, SeededTrials, TrialSources};
use super::types::{CalculationResults, PercentileBand, PortfolioInputs, YearProjection};

/// Balance trajectory of one Monte Carlo trial.
///
/// `balances` has one more entry than `withdrawals`: index 0 is the starting
/// balance, index `k + 1` the balance after year `k`.
#[derive(Debug, Clone)]
pub(crate) struct TrialPath {
    pub(crate) balances: Vec<f64>,
    pub(crate) withdrawals: Vec<f64>,
}

impl TrialPath {
    pub(crate) fn with_capacity(years: usize) -> Self {
        Self {
            balances: Vec::with_capacity(years + 1),
            withdrawals: Vec::with_capacity(years),
        }
    }

    fn ending_balance(&self) -> f64 {
        self.balances.last().copied().unwrap_or(0.0)
    }
}

/// Cash flows that are identical across trials, reported per projection year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct YearFlow {
    pub(crate) contributions: f64,
    pub(crate) expenses: f64,
    pub(crate) income: f64,
}

/// `years + 1` balances compounding `previous * (1 + annual_return) + annual_contribution`.
pub fn run_deterministic_projection(
    starting_balance: f64,
    annual_contribution: f64,
    years: u32,
    annual_return: f64,
) -> Vec<f64> {
    let mut balances = Vec::with_capacity(years as usize + 1);
    let mut balance = starting_balance;
    balances.push(balance);
    for _ in 0..years {
        balance = balance * (1.0 + annual_return) + annual_contribution;
        balances.push(balance);
    }
    balances
}

/// Monte Carlo over normally distributed annual returns, seeded from
/// `inputs.seed`.
///
/// A trial succeeds when its final balance is >= 0. Balances are never
/// floored, so a depleted trial keeps compounding its shortfall.
pub fn run_monte_carlo_simulation(inputs: &PortfolioInputs) -> EngineResult<CalculationResults> {
    run_monte_carlo_with_sources(inputs, &SeededTrials::new(inputs.seed))
}

pub fn run_monte_carlo_with_sources<S: TrialSources>(
    inputs: &PortfolioInputs,
    sources: &S,
) -> EngineResult<CalculationResults> {
    validate_portfolio_inputs(inputs)?;

    let withdrawal = (-inputs.annual_contribution).max(0.0);
    let flow = YearFlow {
        contributions: inputs.annual_contribution.max(0.0),
        expenses: withdrawal,
        income: 0.0,
    };
    let flows = vec![flow; inputs.years as usize];

    let paths = run_trials(inputs.runs, sources, |source| {
        simulate_constant_flow_trial(inputs, source)
    });
    let results = summarize_trials(&paths, inputs.start_age, &flows);

    log::debug!(
        "monte carlo: runs={} years={} success={:.4} median_end={:.2}",
        inputs.runs,
        inputs.years,
        results.success_probability,
        results.median_ending_balance
    );
    Ok(results)
}

pub(crate) fn validate_portfolio_inputs(inputs: &PortfolioInputs) -> EngineResult<()> {
    if inputs.runs == 0 {
        return Err(EngineError::invalid("runs", "must be > 0"));
    }
    if inputs.runs > MAX_RUNS {
        return Err(EngineError::invalid("runs", format!("must be <= {MAX_RUNS}")));
    }
    if inputs.years > MAX_YEARS {
        return Err(EngineError::invalid("years", format!("must be <= {MAX_YEARS}")));
    }
    ensure_non_negative("startingBalance", inputs.starting_balance)?;
    ensure_finite("annualContribution", inputs.annual_contribution)?;
    ensure_finite("returnMean", inputs.return_mean)?;
    ensure_non_negative("returnStd", inputs.return_std)?;
    Ok(())
}

/// Fans trials out across the rayon pool. Output order follows trial index,
/// so aggregation never depends on scheduling.
pub(crate) fn run_trials<S, F>(runs: u32, sources: &S, simulate: F) -> Vec<TrialPath>
where
    S: TrialSources,
    F: Fn(&mut S::Source) -> TrialPath + Sync,
{
    (0..runs)
        .into_par_iter()
        .map(|trial| {
            let mut source = sources.for_trial(trial);
            simulate(&mut source)
        })
        .collect()
}

pub(crate) fn sample_return<N: NormalSource>(mean: f64, std: f64, source: &mut N) -> f64 {
    mean + std * source.standard_normal()
}

fn simulate_constant_flow_trial<N: NormalSource>(
    inputs: &PortfolioInputs,
    source: &mut N,
) -> TrialPath {
    let years = inputs.years as usize;
    let withdrawal = (-inputs.annual_contribution).max(0.0);
    let mut path = TrialPath::with_capacity(years);

    let mut balance = inputs.starting_balance;
    path.balances.push(balance);
    for _ in 0..years {
        let annual_return = sample_return(inputs.return_mean, inputs.return_std, source);
        balance = balance * (1.0 + annual_return) + inputs.annual_contribution;
        path.balances.push(balance);
        path.withdrawals.push(withdrawal);
    }
    path
}

/// Aggregates finished trials. `flows` carries one entry per projection year.
pub(crate) fn summarize_trials(
    paths: &[TrialPath],
    start_age: u32,
    flows: &[YearFlow],
) -> CalculationResults {
    let years = flows.len();
    let runs = paths.len();

    let successes = paths
        .iter()
        .filter(|path| path.ending_balance() >= 0.0)
        .count();
    let success_probability = if runs == 0 {
        0.0
    } else {
        (successes as f64 / runs as f64).clamp(0.0, 1.0)
    };

    let mut endings: Vec<f64> = paths.iter().map(TrialPath::ending_balance).collect();
    endings.sort_by(|a, b| a.total_cmp(b));
    let median_ending_balance = percentile_sorted(&endings, 50.0);
    let worst_case_balance = endings.first().copied().unwrap_or(0.0);

    let mut percentiles = Vec::with_capacity(years + 1);
    let mut column = Vec::with_capacity(runs);
    for idx in 0..=years {
        column.clear();
        column.extend(
            paths
                .iter()
                .map(|path| path.balances.get(idx).copied().unwrap_or(0.0)),
        );
        column.sort_by(|a, b| a.total_cmp(b));
        percentiles.push(PercentileBand {
            year: idx as u32,
            p10: percentile_sorted(&column, 10.0),
            p25: percentile_sorted(&column, 25.0),
            median: percentile_sorted(&column, 50.0),
            p75: percentile_sorted(&column, 75.0),
            p90: percentile_sorted(&column, 90.0),
        });
    }

    let mut yearly_projections = Vec::with_capacity(years);
    for (idx, flow) in flows.iter().enumerate() {
        let mut withdrawals: Vec<f64> = paths
            .iter()
            .map(|path| path.withdrawals.get(idx).copied().unwrap_or(0.0))
            .collect();
        yearly_projections.push(YearProjection {
            year: idx as u32,
            age: start_age + idx as u32,
            starting_balance: percentiles[idx].median,
            contributions: flow.contributions,
            withdrawals: percentile(&mut withdrawals, 50.0),
            ending_balance: percentiles[idx + 1].median,
            expenses: flow.expenses,
            income: flow.income,
        });
    }

    let year_of_first_shortfall = yearly_projections
        .iter()
        .find(|year| year.ending_balance <= 0.0)
        .map(|year| year.year);
    let sustainable_withdrawal_rate = first_year_withdrawal_rate(&yearly_projections);

    CalculationResults {
        success_probability,
        median_ending_balance,
        worst_case_balance,
        year_of_first_shortfall,
        sustainable_withdrawal_rate,
        yearly_projections,
        percentiles,
    }
}

fn first_year_withdrawal_rate(years: &[YearProjection]) -> f64 {
    let Some(first) = years.iter().find(|year| year.withdrawals > 0.0) else {
        return 0.0;
    };
    if first.starting_balance <= 0.0 {
        return 1.0;
    }
    (first.withdrawals / first.starting_balance).clamp(0.0, 1.0)
}

pub(crate) fn percentile(values: &mut [f64], p: f64) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(values, p)
}

/// Linear interpolation between closest ranks of an ascending slice.
pub(crate) fn percentile_sorted(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0).clamp(0.0, 1.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        let lo = values[lower];
        let hi = values[upper];
        (lo + (hi - lo) * w).clamp(lo, hi)
    }
}
