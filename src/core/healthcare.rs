use super::types::HealthcareCostEntry;

pub const DEFAULT_MEDICARE_AGE: u32 = 65;
pub const DEFAULT_BENCHMARK_PREMIUM: f64 = 8_000.0;

const PRE_MEDICARE_COSTS: [(u32, HealthcareCostEntry); 10] = [
    (55, cost(8_000.0, 3_000.0)),
    (56, cost(8_200.0, 3_100.0)),
    (57, cost(8_400.0, 3_200.0)),
    (58, cost(8_600.0, 3_300.0)),
    (59, cost(8_800.0, 3_400.0)),
    (60, cost(9_200.0, 3_600.0)),
    (61, cost(9_600.0, 3_800.0)),
    (62, cost(10_000.0, 4_000.0)),
    (63, cost(10_500.0, 4_200.0)),
    (64, cost(11_000.0, 4_500.0)),
];

const FALLBACK_LOWER_ANCHOR: f64 = 11_000.0;
const FALLBACK_UPPER_ANCHOR: f64 = 15_500.0;

const MEDICARE_PART_B_MONTHLY: f64 = 174.70;
const MEDICARE_PART_D_MONTHLY: f64 = 50.0;
const MEDIGAP_MONTHLY: f64 = 150.0;
const MEDICARE_OUT_OF_POCKET: f64 = 2_000.0;

// 2024 poverty guideline, 48 contiguous states.
const FPL_FIRST_PERSON: f64 = 15_060.0;
const FPL_ADDITIONAL_PERSON: f64 = 5_380.0;
const SUBSIDY_CUTOFF_PCT_FPL: f64 = 400.0;

const fn cost(premium: f64, out_of_pocket: f64) -> HealthcareCostEntry {
    HealthcareCostEntry {
        premium,
        out_of_pocket,
        total: premium + out_of_pocket,
    }
}

pub fn pre_medicare_cost_entry(age: u32) -> Option<HealthcareCostEntry> {
    PRE_MEDICARE_COSTS
        .iter()
        .find(|(entry_age, _)| *entry_age == age)
        .map(|(_, entry)| *entry)
}

pub fn medicare_annual_cost() -> f64 {
    (MEDICARE_PART_B_MONTHLY + MEDICARE_PART_D_MONTHLY + MEDIGAP_MONTHLY) * 12.0
        + MEDICARE_OUT_OF_POCKET
}

/// Ages off the table interpolate between the surrounding multiples of five,
/// using the fallback anchors where the table has no entry.
pub fn calculate_healthcare_costs(age: u32, medicare_age: u32) -> f64 {
    if age >= medicare_age {
        return medicare_annual_cost();
    }
    if let Some(entry) = pre_medicare_cost_entry(age) {
        return entry.total;
    }

    let lower_age = (age / 5) * 5;
    let upper_age = lower_age + 5;
    let lower_cost = pre_medicare_cost_entry(lower_age)
        .map(|entry| entry.total)
        .unwrap_or(FALLBACK_LOWER_ANCHOR);
    let upper_cost = pre_medicare_cost_entry(upper_age)
        .map(|entry| entry.total)
        .unwrap_or(FALLBACK_UPPER_ANCHOR);

    lower_cost + (upper_cost - lower_cost) * ((age - lower_age) as f64 / 5.0)
}

pub fn federal_poverty_level(household_size: u32) -> f64 {
    FPL_FIRST_PERSON + household_size.saturating_sub(1) as f64 * FPL_ADDITIONAL_PERSON
}

/// Expected contribution as a percent of income, by income as percent of FPL.
fn expected_contribution_percent(pct_fpl: f64) -> f64 {
    if pct_fpl <= 150.0 {
        0.0
    } else if pct_fpl <= 200.0 {
        (pct_fpl - 150.0) / 50.0 * 2.0
    } else if pct_fpl <= 250.0 {
        2.0 + (pct_fpl - 200.0) / 50.0 * 2.0
    } else if pct_fpl <= 300.0 {
        4.0 + (pct_fpl - 250.0) / 50.0 * 2.0
    } else {
        6.0 + ((pct_fpl - 300.0) / 100.0 * 2.5).min(2.5)
    }
}

pub fn calculate_aca_subsidy(annual_income: f64, household_size: u32, benchmark_premium: f64) -> f64 {
    let fpl = federal_poverty_level(household_size);
    let pct_fpl = annual_income / fpl * 100.0;
    if pct_fpl >= SUBSIDY_CUTOFF_PCT_FPL {
        return 0.0;
    }

    let expected_contribution = annual_income * expected_contribution_percent(pct_fpl) / 100.0;
    (benchmark_premium - expected_contribution).max(0.0)
}
