const COMPUTATION_YEARS: usize = 35;
const AIME_DIVISOR: f64 = (COMPUTATION_YEARS * 12) as f64;

// 2024 bend points.
const FIRST_BEND_POINT: f64 = 1_174.0;
const SECOND_BEND_POINT: f64 = 7_078.0;

const EARLY_REDUCTION_FIRST_36: f64 = 5.0 / 900.0;
const EARLY_REDUCTION_BEYOND_36: f64 = 5.0 / 1200.0;
const MAX_EARLY_REDUCTION: f64 = 0.30;
const DELAYED_CREDIT_PER_MONTH: f64 = 2.0 / 300.0;

pub const DEFAULT_FULL_RETIREMENT_AGE: f64 = 67.0;

/// Transitional birth years. Years in 1944..=1953 are deliberately absent and
/// resolve to the default.
const FRA_SCHEDULE: [(i32, f64); 12] = [
    (1938, 65.0 + 2.0 / 12.0),
    (1939, 65.0 + 4.0 / 12.0),
    (1940, 65.0 + 6.0 / 12.0),
    (1941, 65.0 + 8.0 / 12.0),
    (1942, 65.0 + 10.0 / 12.0),
    (1943, 66.0),
    (1954, 66.0),
    (1955, 66.0 + 2.0 / 12.0),
    (1956, 66.0 + 4.0 / 12.0),
    (1957, 66.0 + 6.0 / 12.0),
    (1958, 66.0 + 8.0 / 12.0),
    (1959, 66.0 + 10.0 / 12.0),
];

/// Highest 35 years of earnings, averaged per month. Fewer than 35 years
/// count the missing ones as zero.
pub fn calculate_aime(lifetime_earnings: &[f64], index_factor: f64) -> f64 {
    let mut earnings = lifetime_earnings.to_vec();
    earnings.sort_by(|a, b| b.total_cmp(a));

    let total_indexed: f64 = earnings
        .iter()
        .take(COMPUTATION_YEARS)
        .map(|year| year * index_factor)
        .sum();

    (total_indexed / AIME_DIVISOR).max(0.0)
}

pub fn calculate_pia(aime: f64) -> f64 {
    let pia = if aime <= FIRST_BEND_POINT {
        aime * 0.90
    } else if aime <= SECOND_BEND_POINT {
        FIRST_BEND_POINT * 0.90 + (aime - FIRST_BEND_POINT) * 0.32
    } else {
        FIRST_BEND_POINT * 0.90
            + (SECOND_BEND_POINT - FIRST_BEND_POINT) * 0.32
            + (aime - SECOND_BEND_POINT) * 0.15
    };
    pia.max(0.0)
}

/// Monthly benefit when claiming at `claiming_age` against full retirement
/// age `fra`. Ages are fractional years.
pub fn calculate_social_security_benefit(aime: f64, claiming_age: f64, fra: f64) -> f64 {
    let pia = calculate_pia(aime);

    if claiming_age < fra {
        let months_early = (fra - claiming_age) * 12.0;
        let reduction = if months_early <= 36.0 {
            months_early * EARLY_REDUCTION_FIRST_36
        } else {
            36.0 * EARLY_REDUCTION_FIRST_36 + (months_early - 36.0) * EARLY_REDUCTION_BEYOND_36
        };
        pia * (1.0 - reduction.min(MAX_EARLY_REDUCTION))
    } else if claiming_age > fra {
        let months_delayed = (claiming_age - fra) * 12.0;
        pia * (1.0 + months_delayed * DELAYED_CREDIT_PER_MONTH)
    } else {
        pia
    }
}

pub fn full_retirement_age(birth_year: i32) -> f64 {
    if birth_year <= 1937 {
        return 65.0;
    }
    if birth_year >= 1960 {
        return DEFAULT_FULL_RETIREMENT_AGE;
    }
    FRA_SCHEDULE
        .iter()
        .find(|(year, _)| *year == birth_year)
        .map(|(_, age)| *age)
        .unwrap_or(DEFAULT_FULL_RETIREMENT_AGE)
}
