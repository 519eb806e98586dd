use serde::{Deserialize, Serialize};

use super::config::{Assumptions, DEFAULT_SEED, MAX_RUNS, MAX_YEARS};
use super::engine::run_monte_carlo_simulation;
use super::error::{EngineError, EngineResult, ensure_finite, ensure_non_negative};
use super::types::{PortfolioInputs, WithdrawalRateResult};

/// Headline rate for a fixed spending need: `annual_expenses / balance`,
/// scored by Monte Carlo under the standard return assumption.
pub fn calculate_sustainable_withdrawal_rate(
    balance: f64,
    annual_expenses: f64,
    years: u32,
) -> EngineResult<WithdrawalRateResult> {
    calculate_sustainable_withdrawal_rate_with(
        balance,
        annual_expenses,
        years,
        &Assumptions::default(),
    )
}

pub fn calculate_sustainable_withdrawal_rate_with(
    balance: f64,
    annual_expenses: f64,
    years: u32,
    assumptions: &Assumptions,
) -> EngineResult<WithdrawalRateResult> {
    ensure_non_negative("balance", balance)?;
    ensure_non_negative("annualExpenses", annual_expenses)?;

    let rate = withdrawal_rate(balance, annual_expenses);
    let inputs = PortfolioInputs::new(
        balance,
        -annual_expenses,
        years,
        assumptions.standard_return_mean,
        assumptions.standard_return_std,
    )
    .with_runs(assumptions.runs)
    .with_seed(assumptions.seed);
    let results = run_monte_carlo_simulation(&inputs)?;

    Ok(WithdrawalRateResult {
        rate,
        success_probability: results.success_probability,
    })
}

fn withdrawal_rate(balance: f64, annual_expenses: f64) -> f64 {
    if balance <= 0.0 {
        return if annual_expenses > 0.0 { 1.0 } else { 0.0 };
    }
    (annual_expenses / balance).clamp(0.0, 1.0)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalGoal {
    /// Highest withdrawal rate (fraction of `balance`) meeting the target.
    MaxWithdrawalRate,
    /// Smallest starting balance funding `annual_expenses` at the target.
    RequiredBalance,
}

/// The fixed side of a solve: whichever field the goal does not search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalPlan {
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub annual_expenses: f64,
    pub years: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WithdrawalSolveConfig {
    pub goal: WithdrawalGoal,
    pub target_success_probability: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub runs_per_iteration: u32,
    pub final_runs: u32,
    pub return_mean: f64,
    pub return_std: f64,
    pub seed: u64,
}

impl Default for WithdrawalSolveConfig {
    fn default() -> Self {
        let assumptions = Assumptions::default();
        Self {
            goal: WithdrawalGoal::MaxWithdrawalRate,
            target_success_probability: 0.90,
            search_min: 0.0,
            search_max: 0.15,
            tolerance: 1e-4,
            max_iterations: 40,
            runs_per_iteration: 500,
            final_runs: 2_000,
            return_mean: assumptions.standard_return_mean,
            return_std: assumptions.standard_return_std,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub success_probability: f64,
    pub success_ci_half_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalSolveResult {
    pub goal: WithdrawalGoal,
    pub target_success_probability: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub solved_value: Option<f64>,
    pub solved_withdrawal_rate: Option<f64>,
    pub achieved_success_probability: Option<f64>,
    pub achieved_success_ci_half_width: Option<f64>,
    pub iterations: Vec<WithdrawalSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Bisects the searched quantity until the Monte Carlo success probability
/// brackets the target within `tolerance`.
///
/// Every candidate reuses the same seed, so success is monotone in the
/// candidate and the bracket never flips because of sampling noise.
pub fn solve_withdrawal_goal(
    plan: &WithdrawalPlan,
    config: WithdrawalSolveConfig,
) -> EngineResult<WithdrawalSolveResult> {
    validate_config(plan, config)?;

    // RequiredBalance: success rises with the candidate. MaxWithdrawalRate: it falls.
    let rising = config.goal == WithdrawalGoal::RequiredBalance;
    let meets = |eval: CandidateEval| {
        eval.success_probability + 1e-12 >= config.target_success_probability
    };

    let runs = config.runs_per_iteration;
    let low_eval = evaluate_candidate(plan, config, config.search_min, runs)?;
    let high_eval = evaluate_candidate(plan, config, config.search_max, runs)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    let (never_meets, always_meets) = if rising {
        (!meets(high_eval), meets(low_eval))
    } else {
        (!meets(low_eval), meets(high_eval))
    };

    if never_meets {
        feasible = false;
        message = match config.goal {
            WithdrawalGoal::RequiredBalance => "No balance within the search bounds meets the target.",
            WithdrawalGoal::MaxWithdrawalRate => "Even the lowest rate misses the target.",
        }
        .to_string();
    } else if always_meets {
        converged = true;
        feasible = true;
        let (value, text) = if rising {
            (config.search_min, "Already meets target at lower balance bound.")
        } else {
            (
                config.search_max,
                "Upper rate bound is still feasible; increase search max for a higher rate.",
            )
        };
        solved_value = Some(value);
        message = text.to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let eval = evaluate_candidate(plan, config, mid, runs)?;
            iterations.push(WithdrawalSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_value: mid,
                success_probability: eval.success_probability,
                success_ci_half_width: eval.success_ci_half_width,
            });

            // Keep the feasible end of the bracket on the side the goal reports.
            match (rising, meets(eval)) {
                (true, true) | (false, false) => hi = mid,
                (true, false) | (false, true) => lo = mid,
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved_value = Some(if rising { hi } else { lo });
        feasible = true;
        message = if converged {
            match config.goal {
                WithdrawalGoal::RequiredBalance => "Solved required starting balance.",
                WithdrawalGoal::MaxWithdrawalRate => "Solved maximum sustainable withdrawal rate.",
            }
            .to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate.".to_string()
        };
    }

    let mut achieved_success_probability = None;
    let mut achieved_success_ci_half_width = None;
    let mut solved_withdrawal_rate = None;
    if let Some(value) = solved_value {
        let final_eval = evaluate_candidate(plan, config, value, config.final_runs)?;
        achieved_success_probability = Some(final_eval.success_probability);
        achieved_success_ci_half_width = Some(final_eval.success_ci_half_width);
        solved_withdrawal_rate = Some(match config.goal {
            WithdrawalGoal::MaxWithdrawalRate => value,
            WithdrawalGoal::RequiredBalance => withdrawal_rate(value, plan.annual_expenses),
        });
    }

    if feasible {
        log::info!(
            "withdrawal solve {:?}: value={:?} iterations={} converged={}",
            config.goal,
            solved_value,
            iterations.len(),
            converged
        );
    } else {
        log::warn!("withdrawal solve {:?}: {}", config.goal, message);
    }

    Ok(WithdrawalSolveResult {
        goal: config.goal,
        target_success_probability: config.target_success_probability,
        search_min: config.search_min,
        search_max: config.search_max,
        solved_value,
        solved_withdrawal_rate,
        achieved_success_probability,
        achieved_success_ci_half_width,
        iterations,
        converged,
        feasible,
        message,
    })
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    success_probability: f64,
    success_ci_half_width: f64,
}

fn evaluate_candidate(
    plan: &WithdrawalPlan,
    config: WithdrawalSolveConfig,
    candidate_value: f64,
    runs: u32,
) -> EngineResult<CandidateEval> {
    let candidate = candidate_value.max(0.0);
    let (balance, annual_withdrawal) = match config.goal {
        WithdrawalGoal::MaxWithdrawalRate => (plan.balance, plan.balance * candidate),
        WithdrawalGoal::RequiredBalance => (candidate, plan.annual_expenses),
    };

    let inputs = PortfolioInputs::new(
        balance,
        -annual_withdrawal,
        plan.years,
        config.return_mean,
        config.return_std,
    )
    .with_runs(runs.max(1))
    .with_seed(config.seed);
    let results = run_monte_carlo_simulation(&inputs)?;

    Ok(CandidateEval {
        success_probability: results.success_probability,
        success_ci_half_width: binomial_ci_half_width(results.success_probability, inputs.runs),
    })
}

fn binomial_ci_half_width(p: f64, n: u32) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    1.96 * (p * (1.0 - p) / n as f64).sqrt()
}

fn validate_config(plan: &WithdrawalPlan, config: WithdrawalSolveConfig) -> EngineResult<()> {
    match config.goal {
        WithdrawalGoal::MaxWithdrawalRate => {
            ensure_non_negative("balance", plan.balance)?;
            if plan.balance <= 0.0 {
                return Err(EngineError::invalid("balance", "must be > 0 to solve for a rate"));
            }
        }
        WithdrawalGoal::RequiredBalance => {
            ensure_non_negative("annualExpenses", plan.annual_expenses)?;
        }
    }
    if !(0.0..=1.0).contains(&config.target_success_probability) {
        return Err(EngineError::invalid(
            "targetSuccessProbability",
            "must be between 0 and 1",
        ));
    }
    ensure_non_negative("searchMin", config.search_min)?;
    ensure_finite("searchMax", config.search_max)?;
    if config.search_max <= config.search_min {
        return Err(EngineError::invalid(
            "searchMax",
            "must be greater than searchMin",
        ));
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(EngineError::invalid("tolerance", "must be > 0"));
    }
    if config.max_iterations == 0 {
        return Err(EngineError::invalid("maxIterations", "must be > 0"));
    }
    if plan.years > MAX_YEARS {
        return Err(EngineError::invalid("years", format!("must be <= {MAX_YEARS}")));
    }
    if config.runs_per_iteration == 0 || config.runs_per_iteration > MAX_RUNS {
        return Err(EngineError::invalid(
            "runsPerIteration",
            format!("must be between 1 and {MAX_RUNS}"),
        ));
    }
    if config.final_runs == 0 || config.final_runs > MAX_RUNS {
        return Err(EngineError::invalid(
            "finalRuns",
            format!("must be between 1 and {MAX_RUNS}"),
        ));
    }
    ensure_finite("returnMean", config.return_mean)?;
    ensure_non_negative("returnStd", config.return_std)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn flat_market(goal: WithdrawalGoal, search_max: f64, tolerance: f64) -> WithdrawalSolveConfig {
        WithdrawalSolveConfig {
            goal,
            target_success_probability: 1.0,
            search_min: 0.0,
            search_max,
            tolerance,
            max_iterations: 40,
            runs_per_iteration: 1,
            final_runs: 1,
            return_mean: 0.0,
            return_std: 0.0,
            seed: 7,
        }
    }

    #[test]
    fn four_percent_of_a_million_over_thirty_years() {
        let result = calculate_sustainable_withdrawal_rate(1_000_000.0, 40_000.0, 30)
            .expect("valid inputs");
        assert_eq!(result.rate, 0.04);
        assert!(result.success_probability > 0.0);
        assert!(result.success_probability <= 1.0);
    }

    #[test]
    fn rate_is_clamped_for_degenerate_balances() {
        let broke = calculate_sustainable_withdrawal_rate(0.0, 10_000.0, 5).expect("valid inputs");
        assert_eq!(broke.rate, 1.0);
        assert_eq!(broke.success_probability, 0.0);

        let idle = calculate_sustainable_withdrawal_rate(0.0, 0.0, 5).expect("valid inputs");
        assert_eq!(idle.rate, 0.0);
        assert_eq!(idle.success_probability, 1.0);

        let greedy = calculate_sustainable_withdrawal_rate(1_000.0, 5_000.0, 5).expect("valid inputs");
        assert_eq!(greedy.rate, 1.0);
    }

    #[test]
    fn higher_spending_never_improves_success() {
        let modest = calculate_sustainable_withdrawal_rate(1_000_000.0, 30_000.0, 30)
            .expect("valid inputs");
        let heavy = calculate_sustainable_withdrawal_rate(1_000_000.0, 60_000.0, 30)
            .expect("valid inputs");
        assert!(heavy.success_probability <= modest.success_probability);
    }

    #[test]
    fn rejects_negative_inputs() {
        assert!(calculate_sustainable_withdrawal_rate(-1.0, 10.0, 5).is_err());
        assert!(calculate_sustainable_withdrawal_rate(100.0, -10.0, 5).is_err());
        assert!(calculate_sustainable_withdrawal_rate(f64::NAN, 10.0, 5).is_err());

        let err = calculate_sustainable_withdrawal_rate(1_000.0, 10.0, u32::MAX)
            .expect_err("horizon too long");
        assert!(err.to_string().contains("years"));
    }

    #[test]
    fn custom_assumptions_drive_the_simulation() {
        let assumptions = Assumptions {
            standard_return_mean: 0.0,
            standard_return_std: 0.0,
            runs: 3,
            ..Assumptions::default()
        };
        let exact = calculate_sustainable_withdrawal_rate_with(1_000.0, 100.0, 10, &assumptions)
            .expect("valid inputs");
        assert_eq!(exact.success_probability, 1.0);
        let short = calculate_sustainable_withdrawal_rate_with(1_000.0, 101.0, 10, &assumptions)
            .expect("valid inputs");
        assert_eq!(short.success_probability, 0.0);
    }

    #[test]
    fn max_rate_solver_finds_deterministic_solution() {
        let plan = WithdrawalPlan {
            balance: 1_000.0,
            annual_expenses: 0.0,
            years: 10,
        };
        let config = flat_market(WithdrawalGoal::MaxWithdrawalRate, 0.5, 1e-4);

        let result = solve_withdrawal_goal(&plan, config).expect("must solve");
        assert!(result.feasible);
        assert!(result.converged);
        assert_close(result.solved_value.expect("value expected"), 0.10, 2e-4);
        assert_eq!(result.solved_withdrawal_rate, result.solved_value);
        assert_close(
            result.achieved_success_probability.expect("probability expected"),
            1.0,
            1e-9,
        );
        assert!(!result.iterations.is_empty());
        for it in &result.iterations {
            assert!(it.lower_bound <= it.candidate_value && it.candidate_value <= it.upper_bound);
        }
    }

    #[test]
    fn required_balance_solver_finds_deterministic_solution() {
        let plan = WithdrawalPlan {
            balance: 0.0,
            annual_expenses: 100.0,
            years: 10,
        };
        let config = flat_market(WithdrawalGoal::RequiredBalance, 5_000.0, 0.5);

        let result = solve_withdrawal_goal(&plan, config).expect("must solve");
        assert!(result.feasible);
        let balance = result.solved_value.expect("value expected");
        assert_close(balance, 1_000.0, 1.0);
        assert_close(
            result.solved_withdrawal_rate.expect("rate expected"),
            100.0 / balance,
            1e-12,
        );
    }

    #[test]
    fn required_balance_reports_infeasible_when_bounds_too_low() {
        let plan = WithdrawalPlan {
            balance: 0.0,
            annual_expenses: 100.0,
            years: 10,
        };
        let config = flat_market(WithdrawalGoal::RequiredBalance, 500.0, 0.5);

        let result = solve_withdrawal_goal(&plan, config).expect("must return result");
        assert!(!result.feasible);
        assert!(result.solved_value.is_none());
        assert!(result.achieved_success_probability.is_none());
    }

    #[test]
    fn max_rate_returns_upper_bound_when_it_is_still_feasible() {
        let plan = WithdrawalPlan {
            balance: 1_000.0,
            annual_expenses: 0.0,
            years: 10,
        };
        let config = flat_market(WithdrawalGoal::MaxWithdrawalRate, 0.05, 1e-4);

        let result = solve_withdrawal_goal(&plan, config).expect("must return result");
        assert!(result.feasible);
        assert_eq!(result.solved_value, Some(0.05));
        assert!(result.iterations.is_empty());
        assert!(result.message.contains("increase search max"));
    }

    #[test]
    fn stochastic_solve_lands_near_target() {
        let plan = WithdrawalPlan {
            balance: 1_000_000.0,
            annual_expenses: 0.0,
            years: 30,
        };
        let config = WithdrawalSolveConfig {
            runs_per_iteration: 300,
            final_runs: 300,
            tolerance: 1e-3,
            ..WithdrawalSolveConfig::default()
        };

        let result = solve_withdrawal_goal(&plan, config).expect("must solve");
        assert!(result.feasible);
        let rate = result.solved_value.expect("value expected");
        assert!(rate > 0.0 && rate < 0.15, "rate {rate}");
        let achieved = result.achieved_success_probability.expect("probability expected");
        assert!(achieved + 1e-12 >= config.target_success_probability);
        let ci = result.achieved_success_ci_half_width.expect("ci expected");
        assert_close(ci, binomial_ci_half_width(achieved, 300), 1e-12);
    }

    #[test]
    fn validation_rejects_bad_configs() {
        let plan = WithdrawalPlan {
            balance: 1_000.0,
            annual_expenses: 0.0,
            years: 10,
        };
        let base = flat_market(WithdrawalGoal::MaxWithdrawalRate, 0.5, 1e-4);

        let bad_target = WithdrawalSolveConfig {
            target_success_probability: 1.5,
            ..base
        };
        assert!(solve_withdrawal_goal(&plan, bad_target).is_err());

        let inverted = WithdrawalSolveConfig {
            search_min: 0.6,
            ..base
        };
        assert!(solve_withdrawal_goal(&plan, inverted).is_err());

        let no_balance = WithdrawalPlan {
            balance: 0.0,
            ..plan
        };
        assert!(solve_withdrawal_goal(&no_balance, base).is_err());

        let endless = WithdrawalPlan {
            years: MAX_YEARS + 1,
            ..plan
        };
        assert!(solve_withdrawal_goal(&endless, base).is_err());

        let oversized = WithdrawalSolveConfig {
            final_runs: MAX_RUNS + 1,
            ..base
        };
        assert!(solve_withdrawal_goal(&plan, oversized).is_err());
    }

    #[test]
    fn ci_half_width_is_zero_at_certainty() {
        assert_eq!(binomial_ci_half_width(1.0, 100), 0.0);
        assert_eq!(binomial_ci_half_width(0.5, 0), 0.0);
        assert_close(binomial_ci_half_width(0.5, 100), 0.098, 1e-12);
    }
}
