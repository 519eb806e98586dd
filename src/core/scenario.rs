use serde::Serialize;

use super::config::{Assumptions, GuardrailConfig, MAX_RUNS, MAX_YEARS};
use super::engine::{TrialPath, YearFlow, run_trials, sample_return, summarize_trials};
use super::error::{EngineError, EngineResult, ensure_finite, ensure_non_negative};
use super::healthcare::{
    DEFAULT_BENCHMARK_PREMIUM, calculate_aca_subsidy, calculate_healthcare_costs,
};
use super::rng::{NormalSource, SeededTrials, TrialSources};
use super::social_security::{
    calculate_aime, calculate_social_security_benefit, full_retirement_age,
};
use super::tax::{tax_on_gross_income, top_marginal_rate};
use super::types::{
    CalculationResults, Expense, ExpenseType, FilingStatus, HealthcarePhase, IncomeTaxTreatment,
    ScenarioInputs, SocialSecurityStrategy, TaxTreatment, WithdrawalStrategy,
};

const GROSS_UP_ITERATIONS: u32 = 60;

/// One year of the deterministic plan. Amounts are nominal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedYear {
    pub year: u32,
    pub age: u32,
    pub retired: bool,
    pub contributions: f64,
    /// Includes essential expense records and healthcare.
    pub essential_expenses: f64,
    pub discretionary_expenses: f64,
    pub healthcare_expenses: f64,
    /// Gross non-portfolio income, Social Security included.
    pub income: f64,
    pub social_security: f64,
    /// Tax on non-portfolio income alone.
    pub income_tax: f64,
    /// Net amount the portfolio must supply to cover essentials.
    pub essential_draw: f64,
    /// Net amount the portfolio must supply to cover all spending.
    pub full_draw: f64,
    /// Gross withdrawal that nets `full_draw` after tax.
    pub planned_withdrawal: f64,
    /// Extra tax caused by `planned_withdrawal`.
    pub withdrawal_tax: f64,
}

impl PlannedYear {
    /// Gross dollars withdrawn per net dollar spent this year.
    fn gross_factor(&self) -> f64 {
        if self.full_draw > 0.0 {
            self.planned_withdrawal / self.full_draw
        } else {
            1.0
        }
    }
}

/// Which share of a gross withdrawal is ordinary income.
#[derive(Debug, Clone, Copy)]
enum TaxedPortion {
    ProRata { pre_tax_share: f64 },
    AfterTaxFirst { untaxed_capacity: f64 },
}

impl TaxedPortion {
    fn taxed(self, gross: f64) -> f64 {
        match self {
            TaxedPortion::ProRata { pre_tax_share } => gross * pre_tax_share,
            TaxedPortion::AfterTaxFirst { untaxed_capacity } => {
                (gross - untaxed_capacity.max(0.0)).max(0.0)
            }
        }
    }
}

/// Deterministic pre-tax / other split, grown at the expected return. Only
/// used to decide how much of each withdrawal is taxed.
#[derive(Debug, Clone, Copy)]
struct TaxLots {
    pre_tax: f64,
    other: f64,
    fallback_share: f64,
}

impl TaxLots {
    fn portion(&self, strategy: WithdrawalStrategy) -> TaxedPortion {
        match strategy {
            WithdrawalStrategy::TaxEfficient => TaxedPortion::AfterTaxFirst {
                untaxed_capacity: self.other,
            },
            _ => {
                let total = self.pre_tax + self.other;
                let pre_tax_share = if total > 0.0 {
                    self.pre_tax / total
                } else {
                    self.fallback_share
                };
                TaxedPortion::ProRata { pre_tax_share }
            }
        }
    }

    fn withdraw(&mut self, gross: f64, portion: TaxedPortion) {
        let from_pre_tax = portion.taxed(gross);
        self.pre_tax = (self.pre_tax - from_pre_tax).max(0.0);
        self.other = (self.other - (gross - from_pre_tax)).max(0.0);
    }
}

/// Evaluates a scenario with trials seeded from `inputs.seed`, falling back
/// to the assumptions' seed.
pub fn evaluate_scenario(inputs: &ScenarioInputs) -> EngineResult<CalculationResults> {
    let seed = inputs.seed.unwrap_or(inputs.assumptions.seed);
    evaluate_scenario_with_sources(inputs, &SeededTrials::new(seed))
}

pub fn evaluate_scenario_with_sources<S: TrialSources>(
    inputs: &ScenarioInputs,
    sources: &S,
) -> EngineResult<CalculationResults> {
    let plan = build_cashflow_plan(inputs)?;

    let assumptions = inputs.assumptions;
    let scenario = &inputs.scenario;
    let runs = inputs.runs.unwrap_or(assumptions.runs);
    if runs == 0 || runs > MAX_RUNS {
        return Err(EngineError::invalid(
            "runs",
            format!("must be between 1 and {MAX_RUNS}"),
        ));
    }
    let return_std = scenario
        .return_std
        .unwrap_or(assumptions.standard_return_std);
    ensure_non_negative("returnStd", return_std)?;

    let starting_balance: f64 = inputs
        .accounts
        .iter()
        .map(|account| account.current_balance)
        .sum();
    let market = Market {
        mean: scenario.expected_return,
        std: return_std,
    };
    let strategy = scenario.withdrawal_strategy;

    let paths = run_trials(runs, sources, |source| {
        simulate_scenario_trial(&plan, starting_balance, market, strategy, &assumptions, source)
    });

    let flows: Vec<YearFlow> = plan
        .iter()
        .map(|year| YearFlow {
            contributions: year.contributions,
            expenses: year.essential_expenses + year.discretionary_expenses,
            income: year.income,
        })
        .collect();
    let results = summarize_trials(&paths, inputs.profile.current_age, &flows);

    log::info!(
        "scenario '{}' ({:?}): runs={} years={} success={:.4}",
        scenario.name,
        strategy,
        runs,
        plan.len(),
        results.success_probability
    );
    Ok(results)
}

/// Builds the per-year plan shared by every trial.
pub fn build_cashflow_plan(inputs: &ScenarioInputs) -> EngineResult<Vec<PlannedYear>> {
    validate_scenario_inputs(inputs)?;

    let profile = &inputs.profile;
    let scenario = &inputs.scenario;
    let assumptions = &inputs.assumptions;
    let status = profile.filing_status;
    let years = profile.horizon_age - profile.current_age;

    let mut pre_tax_contribution = 0.0;
    let mut other_contribution = 0.0;
    let mut lots = TaxLots {
        pre_tax: 0.0,
        other: 0.0,
        fallback_share: 0.0,
    };
    for account in &inputs.accounts {
        let annual = account.monthly_contribution * 12.0;
        if account.tax_treatment == TaxTreatment::PreTax {
            lots.pre_tax += account.current_balance;
            pre_tax_contribution += annual;
        } else {
            lots.other += account.current_balance;
            other_contribution += annual;
        }
    }
    let composition = lots.pre_tax + lots.other + pre_tax_contribution + other_contribution;
    if composition > 0.0 {
        lots.fallback_share = (lots.pre_tax + pre_tax_contribution) / composition;
    }

    // Earnings history wins over a precomputed AIME.
    let aime = match &inputs.lifetime_earnings {
        Some(earnings) => Some(calculate_aime(earnings, 1.0)),
        None => inputs.aime,
    };
    let monthly_benefit = aime.map(|aime| {
        let fra = full_retirement_age(profile.birth_year);
        let claiming_age = claiming_age(scenario.social_security_strategy, fra, assumptions);
        (
            claiming_age,
            calculate_social_security_benefit(aime, claiming_age, fra),
        )
    });

    let mut plan = Vec::with_capacity(years as usize);
    for year in 0..years {
        let age = profile.current_age + year;
        let inflation = (1.0 + scenario.inflation_rate).powi(year as i32);
        let retired = age >= scenario.retirement_age;

        lots.pre_tax *= 1.0 + scenario.expected_return;
        lots.other *= 1.0 + scenario.expected_return;

        if !retired {
            lots.pre_tax += pre_tax_contribution;
            lots.other += other_contribution;
            plan.push(PlannedYear {
                year,
                age,
                retired,
                contributions: pre_tax_contribution + other_contribution,
                essential_expenses: 0.0,
                discretionary_expenses: 0.0,
                healthcare_expenses: 0.0,
                income: 0.0,
                social_security: 0.0,
                income_tax: 0.0,
                essential_draw: 0.0,
                full_draw: 0.0,
                planned_withdrawal: 0.0,
                withdrawal_tax: 0.0,
            });
            continue;
        }

        let mut income = 0.0;
        let mut taxable_income = 0.0;
        for source in &inputs.income_sources {
            if !active_at(age, source.start_age, source.end_age) {
                continue;
            }
            let amount = source.annual_amount * (1.0 + source.cola_rate).powi(year as i32);
            income += amount;
            if source.tax_treatment == IncomeTaxTreatment::Taxable {
                taxable_income += amount;
            }
        }

        let social_security = match monthly_benefit {
            Some((claiming_age, monthly)) if age as f64 >= claiming_age => {
                monthly * 12.0 * inflation
            }
            _ => 0.0,
        };
        income += social_security;
        taxable_income += social_security * assumptions.social_security_taxable_fraction;

        let income_tax = tax_on_gross_income(taxable_income, status);
        let net_income = income - income_tax;

        let mut essential = scenario.essential_spending * inflation;
        let mut discretionary = scenario.discretionary_spending * inflation;
        let mut healthcare = 0.0;
        for expense in &inputs.expenses {
            if !active_at(age, expense.start_age, expense.end_age) {
                continue;
            }
            let amount = match expense.healthcare_phase {
                Some(phase) => {
                    let cost = healthcare_cost(expense, phase, age, year, income / inflation, inputs);
                    healthcare += cost;
                    cost
                }
                None => expense.amount * 12.0 * (1.0 + expense.inflation_rate).powi(year as i32),
            };
            match expense.expense_type {
                ExpenseType::Essential => essential += amount,
                ExpenseType::Discretionary => discretionary += amount,
            }
        }

        let essential_draw = (essential - net_income).max(0.0);
        let full_draw = (essential + discretionary - net_income).max(0.0);

        let portion = lots.portion(scenario.withdrawal_strategy);
        let (planned_withdrawal, withdrawal_tax) =
            gross_withdrawal_for_net(full_draw, taxable_income, portion, status);
        lots.withdraw(planned_withdrawal, portion);

        plan.push(PlannedYear {
            year,
            age,
            retired,
            contributions: 0.0,
            essential_expenses: essential,
            discretionary_expenses: discretionary,
            healthcare_expenses: healthcare,
            income,
            social_security,
            income_tax,
            essential_draw,
            full_draw,
            planned_withdrawal,
            withdrawal_tax,
        });
    }

    log::debug!(
        "cash-flow plan: {} years, retirement at {}",
        plan.len(),
        scenario.retirement_age
    );
    Ok(plan)
}

fn claiming_age(strategy: SocialSecurityStrategy, fra: f64, assumptions: &Assumptions) -> f64 {
    match strategy {
        SocialSecurityStrategy::Early => assumptions.early_claiming_age,
        SocialSecurityStrategy::Full => fra,
        SocialSecurityStrategy::Delayed => assumptions.delayed_claiming_age,
    }
}

fn active_at(age: u32, start_age: u32, end_age: Option<u32>) -> bool {
    age >= start_age && end_age.is_none_or(|end| age <= end)
}

/// Estimator cost for a healthcare-phase record, zero outside its phase.
/// Pre-Medicare costs are reduced by the ACA credit on the year's income
/// expressed in today's dollars.
fn healthcare_cost(
    expense: &Expense,
    phase: HealthcarePhase,
    age: u32,
    year: u32,
    real_income: f64,
    inputs: &ScenarioInputs,
) -> f64 {
    let medicare_age = inputs.assumptions.medicare_age;
    let in_phase = match phase {
        HealthcarePhase::PreMedicare => age < medicare_age,
        HealthcarePhase::Medicare => age >= medicare_age,
    };
    if !in_phase {
        log::trace!("{} inactive at age {age}", expense.name);
        return 0.0;
    }

    let mut cost = calculate_healthcare_costs(age, medicare_age);
    if phase == HealthcarePhase::PreMedicare {
        let subsidy = calculate_aca_subsidy(
            real_income,
            inputs.profile.household_size,
            DEFAULT_BENCHMARK_PREMIUM,
        );
        cost = (cost - subsidy).max(0.0);
    }
    cost * (1.0 + inputs.assumptions.healthcare_inflation).powi(year as i32)
}

/// Bisects for the gross withdrawal whose after-tax amount covers `net`,
/// given ordinary income already on the return. Returns the gross amount and
/// the extra tax it triggers.
fn gross_withdrawal_for_net(
    net: f64,
    taxable_income: f64,
    portion: TaxedPortion,
    status: FilingStatus,
) -> (f64, f64) {
    if net <= 0.0 {
        return (0.0, 0.0);
    }

    let base_tax = tax_on_gross_income(taxable_income, status);
    let extra_tax =
        |gross: f64| tax_on_gross_income(taxable_income + portion.taxed(gross), status) - base_tax;

    let tax_at_net = extra_tax(net);
    if tax_at_net <= 0.0 {
        return (net, 0.0);
    }

    let mut lo = net;
    let mut hi = net / (1.0 - top_marginal_rate(status)) + 1.0;
    for _ in 0..GROSS_UP_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if mid - extra_tax(mid) >= net {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    (hi, extra_tax(hi))
}

#[derive(Debug, Clone, Copy)]
struct Market {
    mean: f64,
    std: f64,
}

#[derive(Debug, Clone, Copy)]
struct SpendingState {
    discretionary_multiplier: f64,
    initial_withdrawal_rate: Option<f64>,
    reserve_funded: bool,
}

impl Default for SpendingState {
    fn default() -> Self {
        Self {
            discretionary_multiplier: 1.0,
            initial_withdrawal_rate: None,
            reserve_funded: false,
        }
    }
}

fn simulate_scenario_trial<N: NormalSource>(
    plan: &[PlannedYear],
    starting_balance: f64,
    market: Market,
    strategy: WithdrawalStrategy,
    assumptions: &Assumptions,
    source: &mut N,
) -> TrialPath {
    let mut path = TrialPath::with_capacity(plan.len());
    let mut spending = SpendingState::default();
    let mut invested = starting_balance;
    let mut cash = 0.0;

    path.balances.push(invested);
    for (idx, year) in plan.iter().enumerate() {
        let annual_return = sample_return(market.mean, market.std, source);

        if !year.retired {
            invested = invested * (1.0 + annual_return) + year.contributions;
            path.balances.push(invested + cash);
            path.withdrawals.push(0.0);
            continue;
        }

        let portfolio = invested + cash;
        let years_remaining = (plan.len() - idx) as u32;
        let withdrawal = plan_withdrawal(
            strategy,
            year,
            portfolio,
            years_remaining,
            &mut spending,
            assumptions,
        );

        if strategy == WithdrawalStrategy::Buckets {
            let reserve_years = assumptions.bucket_reserve_years.max(0.0);
            if !spending.reserve_funded {
                let carve = (year.planned_withdrawal * reserve_years).min(invested.max(0.0));
                invested -= carve;
                cash += carve;
                spending.reserve_funded = true;
            }

            let from_cash = withdrawal.min(cash.max(0.0));
            cash -= from_cash;
            invested = invested * (1.0 + annual_return) - (withdrawal - from_cash);

            // Only sell into the reserve after a non-negative year.
            if annual_return >= 0.0 {
                let shortfall = (withdrawal * reserve_years - cash).max(0.0);
                let refill = shortfall.min(invested.max(0.0));
                invested -= refill;
                cash += refill;
            }
        } else {
            invested = invested * (1.0 + annual_return) - withdrawal;
        }

        path.balances.push(invested + cash);
        path.withdrawals.push(withdrawal);
    }
    path
}

/// Gross withdrawal for one retired year of one trial.
fn plan_withdrawal(
    strategy: WithdrawalStrategy,
    year: &PlannedYear,
    portfolio: f64,
    years_remaining: u32,
    spending: &mut SpendingState,
    assumptions: &Assumptions,
) -> f64 {
    match strategy {
        WithdrawalStrategy::FourPercent
        | WithdrawalStrategy::TaxEfficient
        | WithdrawalStrategy::Buckets => year.planned_withdrawal,
        WithdrawalStrategy::Guardrails => {
            guardrail_withdrawal(year, portfolio, spending, &assumptions.guardrails)
        }
        WithdrawalStrategy::VariablePercentage => {
            let factor = year.gross_factor();
            let floor = year.essential_draw * factor;
            let ceiling = (year.full_draw * factor
                * assumptions.guardrails.max_discretionary_multiplier)
                .max(floor);
            let rate = annuity_withdrawal_rate(assumptions.vpw_real_return, years_remaining);
            (portfolio.max(0.0) * rate).clamp(floor, ceiling)
        }
    }
}

/// Guyton-Klinger style: essentials are always paid, the discretionary share
/// is cut or raised when the current withdrawal rate leaves the band around
/// the first retirement year's rate.
fn guardrail_withdrawal(
    year: &PlannedYear,
    portfolio: f64,
    spending: &mut SpendingState,
    guardrails: &GuardrailConfig,
) -> f64 {
    let factor = year.gross_factor();
    let essential = year.essential_draw * factor;
    let discretionary = (year.full_draw - year.essential_draw) * factor;
    let current_rate = (essential + discretionary * spending.discretionary_multiplier)
        / portfolio.max(1e-9);

    match spending.initial_withdrawal_rate {
        None if current_rate > 0.0 => spending.initial_withdrawal_rate = Some(current_rate),
        None => {}
        Some(initial) => {
            let mut multiplier = spending.discretionary_multiplier;
            if current_rate > initial * guardrails.upper_guardrail {
                multiplier *= 1.0 - guardrails.cut;
            } else if current_rate < initial * guardrails.lower_guardrail {
                multiplier *= 1.0 + guardrails.raise;
            }
            spending.discretionary_multiplier = multiplier.clamp(
                guardrails.min_discretionary_multiplier,
                guardrails.max_discretionary_multiplier,
            );
        }
    }

    essential + discretionary * spending.discretionary_multiplier
}

/// Variable-percentage withdrawal rate: the level annuity payout that spends
/// the balance down to zero over `years_remaining` years at `real_return`, so
/// the rate climbs as the horizon shortens.
fn annuity_withdrawal_rate(real_return: f64, years_remaining: u32) -> f64 {
    let n = years_remaining.max(1) as f64;
    if real_return.abs() < 1e-9 {
        return 1.0 / n;
    }
    if real_return <= -0.99 {
        return 1.0;
    }

    let payout = real_return / (1.0 - (1.0 + real_return).powf(-n));
    if payout.is_finite() {
        payout.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

fn validate_scenario_inputs(inputs: &ScenarioInputs) -> EngineResult<()> {
    let profile = &inputs.profile;
    let scenario = &inputs.scenario;

    if profile.horizon_age <= profile.current_age {
        return Err(EngineError::invalid(
            "horizonAge",
            "must be greater than currentAge",
        ));
    }
    if scenario.retirement_age < profile.current_age {
        return Err(EngineError::invalid(
            "retirementAge",
            "must be >= currentAge",
        ));
    }
    if scenario.retirement_age > profile.horizon_age {
        return Err(EngineError::invalid(
            "retirementAge",
            "must be <= horizonAge",
        ));
    }
    if profile.horizon_age - profile.current_age > MAX_YEARS {
        return Err(EngineError::invalid(
            "horizonAge",
            format!("must be within {MAX_YEARS} years of currentAge"),
        ));
    }
    if profile.household_size == 0 {
        return Err(EngineError::invalid("householdSize", "must be >= 1"));
    }
    inputs.assumptions.validate()?;

    ensure_non_negative("essentialSpending", scenario.essential_spending)?;
    ensure_non_negative("discretionarySpending", scenario.discretionary_spending)?;
    ensure_finite("expectedReturn", scenario.expected_return)?;
    ensure_finite("inflationRate", scenario.inflation_rate)?;
    if scenario.inflation_rate <= -1.0 {
        return Err(EngineError::invalid("inflationRate", "must be > -1"));
    }
    if let Some(std) = scenario.return_std {
        ensure_non_negative("returnStd", std)?;
    }
    if let Some(aime) = inputs.aime {
        ensure_non_negative("aime", aime)?;
    }
    if let Some(earnings) = &inputs.lifetime_earnings {
        for year in earnings {
            ensure_non_negative("lifetimeEarnings", *year)?;
        }
    }

    for account in &inputs.accounts {
        ensure_non_negative("accounts.currentBalance", account.current_balance)?;
        ensure_non_negative("accounts.monthlyContribution", account.monthly_contribution)?;
    }
    for expense in &inputs.expenses {
        ensure_non_negative("expenses.amount", expense.amount)?;
        ensure_finite("expenses.inflationRate", expense.inflation_rate)?;
    }
    for source in &inputs.income_sources {
        ensure_non_negative("incomeSources.annualAmount", source.annual_amount)?;
        ensure_finite("incomeSources.colaRate", source.cola_rate)?;
    }
    Ok(())
}
