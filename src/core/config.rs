use serde::{Deserialize, Serialize};

use super::error::{EngineError, EngineResult, ensure_finite, ensure_non_negative};

pub const DEFAULT_RUNS: u32 = 1000;
pub const DEFAULT_SEED: u64 = 42;

/// Longest projection horizon accepted from callers, in years.
pub const MAX_YEARS: u32 = 150;
pub const MAX_RUNS: u32 = 100_000;

/// Guardrail spending rule, expressed against the withdrawal rate in the
/// first retirement year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GuardrailConfig {
    pub lower_guardrail: f64,
    pub upper_guardrail: f64,
    pub cut: f64,
    pub raise: f64,
    pub min_discretionary_multiplier: f64,
    pub max_discretionary_multiplier: f64,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            lower_guardrail: 0.8,
            upper_guardrail: 1.2,
            cut: 0.10,
            raise: 0.05,
            min_discretionary_multiplier: 0.5,
            max_discretionary_multiplier: 1.3,
        }
    }
}

impl GuardrailConfig {
    pub(crate) fn validate(&self) -> EngineResult<()> {
        ensure_non_negative("guardrails.lowerGuardrail", self.lower_guardrail)?;
        ensure_finite("guardrails.upperGuardrail", self.upper_guardrail)?;
        if self.upper_guardrail < self.lower_guardrail {
            return Err(EngineError::invalid(
                "guardrails.upperGuardrail",
                "must be >= lowerGuardrail",
            ));
        }
        ensure_non_negative("guardrails.cut", self.cut)?;
        if self.cut >= 1.0 {
            return Err(EngineError::invalid("guardrails.cut", "must be < 1"));
        }
        ensure_non_negative("guardrails.raise", self.raise)?;
        ensure_non_negative(
            "guardrails.minDiscretionaryMultiplier",
            self.min_discretionary_multiplier,
        )?;
        ensure_finite(
            "guardrails.maxDiscretionaryMultiplier",
            self.max_discretionary_multiplier,
        )?;
        if self.max_discretionary_multiplier <= 0.0 {
            return Err(EngineError::invalid(
                "guardrails.maxDiscretionaryMultiplier",
                "must be > 0",
            ));
        }
        if self.min_discretionary_multiplier > self.max_discretionary_multiplier {
            return Err(EngineError::invalid(
                "guardrails.minDiscretionaryMultiplier",
                "cannot exceed maxDiscretionaryMultiplier",
            ));
        }
        Ok(())
    }
}

/// Market, policy and behavioral assumptions that callers rarely override.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Assumptions {
    pub standard_return_mean: f64,
    pub standard_return_std: f64,
    pub runs: u32,
    pub seed: u64,
    pub medicare_age: u32,
    pub social_security_taxable_fraction: f64,
    pub healthcare_inflation: f64,
    pub early_claiming_age: f64,
    pub delayed_claiming_age: f64,
    pub guardrails: GuardrailConfig,
    pub vpw_real_return: f64,
    pub bucket_reserve_years: f64,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            standard_return_mean: 0.07,
            standard_return_std: 0.15,
            runs: DEFAULT_RUNS,
            seed: DEFAULT_SEED,
            medicare_age: 65,
            social_security_taxable_fraction: 0.85,
            healthcare_inflation: 0.05,
            early_claiming_age: 62.0,
            delayed_claiming_age: 70.0,
            guardrails: GuardrailConfig::default(),
            vpw_real_return: 0.035,
            bucket_reserve_years: 2.0,
        }
    }
}

impl Assumptions {
    pub(crate) fn validate(&self) -> EngineResult<()> {
        ensure_finite("standardReturnMean", self.standard_return_mean)?;
        ensure_non_negative("standardReturnStd", self.standard_return_std)?;
        if self.runs == 0 || self.runs > MAX_RUNS {
            return Err(EngineError::invalid(
                "runs",
                format!("must be between 1 and {MAX_RUNS}"),
            ));
        }
        ensure_non_negative(
            "socialSecurityTaxableFraction",
            self.social_security_taxable_fraction,
        )?;
        if self.social_security_taxable_fraction > 1.0 {
            return Err(EngineError::invalid(
                "socialSecurityTaxableFraction",
                "must be <= 1",
            ));
        }
        ensure_finite("healthcareInflation", self.healthcare_inflation)?;
        if self.healthcare_inflation <= -1.0 {
            return Err(EngineError::invalid("healthcareInflation", "must be > -1"));
        }
        ensure_non_negative("earlyClaimingAge", self.early_claiming_age)?;
        ensure_non_negative("delayedClaimingAge", self.delayed_claiming_age)?;
        self.guardrails.validate()?;
        ensure_finite("vpwRealReturn", self.vpw_real_return)?;
        if self.vpw_real_return <= -1.0 {
            return Err(EngineError::invalid("vpwRealReturn", "must be > -1"));
        }
        ensure_non_negative("bucketReserveYears", self.bucket_reserve_years)?;
        Ok(())
    }
}
