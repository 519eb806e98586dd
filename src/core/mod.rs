mod config;
mod engine;
mod error;
mod healthcare;
mod rng;
mod scenario;
mod social_security;
mod solver;
mod tax;
mod types;

pub use config::{Assumptions, DEFAULT_RUNS, DEFAULT_SEED, GuardrailConfig, MAX_RUNS, MAX_YEARS};
pub use engine::{
    run_deterministic_projection, run_monte_carlo_simulation, run_monte_carlo_with_sources,
};
pub use error::{EngineError, EngineResult};
pub use healthcare::{
    DEFAULT_BENCHMARK_PREMIUM, DEFAULT_MEDICARE_AGE, calculate_aca_subsidy,
    calculate_healthcare_costs, federal_poverty_level, medicare_annual_cost,
    pre_medicare_cost_entry,
};
pub use rng::{
    GaussianSource, NormalSource, ScriptedNormals, ScriptedTrials, SeededTrials, TrialSources,
};
pub use scenario::{
    PlannedYear, build_cashflow_plan, evaluate_scenario, evaluate_scenario_with_sources,
};
pub use social_security::{
    DEFAULT_FULL_RETIREMENT_AGE, calculate_aime, calculate_pia, calculate_social_security_benefit,
    full_retirement_age,
};
pub use solver::{
    WithdrawalGoal, WithdrawalPlan, WithdrawalSolveConfig, WithdrawalSolveIteration,
    WithdrawalSolveResult, calculate_sustainable_withdrawal_rate,
    calculate_sustainable_withdrawal_rate_with, solve_withdrawal_goal,
};
pub use tax::{
    calculate_effective_tax_rate, calculate_federal_tax, calculate_taxable_income,
    federal_brackets, standard_deduction, tax_on_gross_income, top_marginal_rate,
};
pub use types::{
    Account, CalculationResults, Expense, ExpenseType, FilingStatus, HealthcareCostEntry,
    HealthcarePhase, IncomeSource, IncomeTaxTreatment, PercentileBand, PortfolioInputs, Profile,
    Scenario, ScenarioInputs, SocialSecurityStrategy, TaxBracket, TaxTreatment, WithdrawalRateResult,
    WithdrawalStrategy, YearProjection,
};
