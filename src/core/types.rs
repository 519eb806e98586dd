use serde::{Deserialize, Serialize};

use super::config::{Assumptions, DEFAULT_RUNS, DEFAULT_SEED};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Single,
    MarriedJoint,
    MarriedSeparate,
    HeadHousehold,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracket {
    /// Exclusive upper bound of the income slice taxed at `rate`.
    pub upper_limit: f64,
    pub rate: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthcareCostEntry {
    pub premium: f64,
    pub out_of_pocket: f64,
    pub total: f64,
}

fn default_runs() -> u32 {
    DEFAULT_RUNS
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

/// Input to a single Monte Carlo call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioInputs {
    pub starting_balance: f64,
    /// Added at the end of every year; negative values are withdrawals.
    pub annual_contribution: f64,
    pub years: u32,
    pub return_mean: f64,
    pub return_std: f64,
    #[serde(default = "default_runs")]
    pub runs: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Only labels `YearProjection::age`.
    #[serde(default)]
    pub start_age: u32,
}

impl PortfolioInputs {
    pub fn new(
        starting_balance: f64,
        annual_contribution: f64,
        years: u32,
        return_mean: f64,
        return_std: f64,
    ) -> Self {
        Self {
            starting_balance,
            annual_contribution,
            years,
            return_mean,
            return_std,
            runs: DEFAULT_RUNS,
            seed: DEFAULT_SEED,
            start_age: 0,
        }
    }

    pub fn with_runs(mut self, runs: u32) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearProjection {
    pub year: u32,
    pub age: u32,
    pub starting_balance: f64,
    pub contributions: f64,
    pub withdrawals: f64,
    pub ending_balance: f64,
    pub expenses: f64,
    pub income: f64,
}

/// Cross-trial balance percentiles at one year index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileBand {
    pub year: u32,
    pub p10: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResults {
    pub success_probability: f64,
    pub median_ending_balance: f64,
    pub worst_case_balance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_of_first_shortfall: Option<u32>,
    pub sustainable_withdrawal_rate: f64,
    pub yearly_projections: Vec<YearProjection>,
    pub percentiles: Vec<PercentileBand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRateResult {
    pub rate: f64,
    pub success_probability: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStrategy {
    FourPercent,
    Guardrails,
    Buckets,
    TaxEfficient,
    VariablePercentage,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialSecurityStrategy {
    Early,
    Full,
    Delayed,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaxTreatment {
    PreTax,
    PostTax,
    Taxable,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeTaxTreatment {
    Taxable,
    TaxFree,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseType {
    Essential,
    Discretionary,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthcarePhase {
    PreMedicare,
    Medicare,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub name: String,
    pub current_balance: f64,
    #[serde(default)]
    pub monthly_contribution: f64,
    pub tax_treatment: TaxTreatment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(default)]
    pub name: String,
    /// Monthly, in today's dollars. Ignored for healthcare-phase expenses,
    /// whose cost comes from the healthcare estimator.
    #[serde(default)]
    pub amount: f64,
    #[serde(rename = "type")]
    pub expense_type: ExpenseType,
    #[serde(default)]
    pub inflation_rate: f64,
    #[serde(default)]
    pub start_age: u32,
    #[serde(default)]
    pub end_age: Option<u32>,
    #[serde(default)]
    pub healthcare_phase: Option<HealthcarePhase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeSource {
    #[serde(default)]
    pub name: String,
    pub annual_amount: f64,
    #[serde(default)]
    pub start_age: u32,
    #[serde(default)]
    pub end_age: Option<u32>,
    #[serde(default)]
    pub cola_rate: f64,
    pub tax_treatment: IncomeTaxTreatment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub current_age: u32,
    pub birth_year: i32,
    /// Age the plan must fund through (life expectancy).
    pub horizon_age: u32,
    pub filing_status: FilingStatus,
    #[serde(default = "default_household_size")]
    pub household_size: u32,
}

fn default_household_size() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    pub retirement_age: u32,
    /// Annual, in today's dollars.
    pub essential_spending: f64,
    /// Annual, in today's dollars.
    pub discretionary_spending: f64,
    pub withdrawal_strategy: WithdrawalStrategy,
    pub social_security_strategy: SocialSecurityStrategy,
    pub expected_return: f64,
    /// Falls back to the standard return std when absent.
    #[serde(default)]
    pub return_std: Option<f64>,
    pub inflation_rate: f64,
}

/// Everything the engine needs to evaluate one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioInputs {
    pub profile: Profile,
    pub scenario: Scenario,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub income_sources: Vec<IncomeSource>,
    /// Average indexed monthly earnings; Social Security is skipped without it.
    #[serde(default)]
    pub aime: Option<f64>,
    /// Indexed annual earnings; when present the AIME is computed from the
    /// highest 35 years and `aime` is ignored.
    #[serde(default)]
    pub lifetime_earnings: Option<Vec<f64>>,
    #[serde(default)]
    pub runs: Option<u32>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub assumptions: Assumptions,
}
