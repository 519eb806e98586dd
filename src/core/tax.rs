use super::types::{FilingStatus, TaxBracket};

// 2024 figures. Separate and head-of-household filers use the single table.
const FEDERAL_BRACKETS_SINGLE: [TaxBracket; 7] = [
    TaxBracket { upper_limit: 11_600.0, rate: 0.10 },
    TaxBracket { upper_limit: 47_150.0, rate: 0.12 },
    TaxBracket { upper_limit: 100_525.0, rate: 0.22 },
    TaxBracket { upper_limit: 191_950.0, rate: 0.24 },
    TaxBracket { upper_limit: 243_725.0, rate: 0.32 },
    TaxBracket { upper_limit: 609_350.0, rate: 0.35 },
    TaxBracket { upper_limit: f64::INFINITY, rate: 0.37 },
];

const FEDERAL_BRACKETS_MARRIED_JOINT: [TaxBracket; 7] = [
    TaxBracket { upper_limit: 23_200.0, rate: 0.10 },
    TaxBracket { upper_limit: 94_300.0, rate: 0.12 },
    TaxBracket { upper_limit: 201_050.0, rate: 0.22 },
    TaxBracket { upper_limit: 383_900.0, rate: 0.24 },
    TaxBracket { upper_limit: 487_450.0, rate: 0.32 },
    TaxBracket { upper_limit: 731_200.0, rate: 0.35 },
    TaxBracket { upper_limit: f64::INFINITY, rate: 0.37 },
];

impl FilingStatus {
    /// Parses the persisted label; anything unrecognized files as single.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "married_joint" => FilingStatus::MarriedJoint,
            "married_separate" => FilingStatus::MarriedSeparate,
            "head_household" => FilingStatus::HeadHousehold,
            _ => FilingStatus::Single,
        }
    }
}

pub fn federal_brackets(filing_status: FilingStatus) -> &'static [TaxBracket] {
    match filing_status {
        FilingStatus::MarriedJoint => &FEDERAL_BRACKETS_MARRIED_JOINT,
        FilingStatus::Single | FilingStatus::MarriedSeparate | FilingStatus::HeadHousehold => {
            &FEDERAL_BRACKETS_SINGLE
        }
    }
}

pub fn top_marginal_rate(filing_status: FilingStatus) -> f64 {
    federal_brackets(filing_status)
        .last()
        .map(|bracket| bracket.rate)
        .unwrap_or(0.0)
}

pub fn calculate_federal_tax(taxable_income: f64, filing_status: FilingStatus) -> f64 {
    let mut remaining_income = taxable_income.max(0.0);
    let mut previous_limit = 0.0;
    let mut tax = 0.0;

    for bracket in federal_brackets(filing_status) {
        if remaining_income <= 0.0 {
            break;
        }
        let bracket_size = bracket.upper_limit - previous_limit;
        let taxable_in_bracket = remaining_income.min(bracket_size);
        tax += taxable_in_bracket * bracket.rate;
        remaining_income -= taxable_in_bracket;
        previous_limit = bracket.upper_limit;
    }

    tax
}

pub fn standard_deduction(filing_status: FilingStatus) -> f64 {
    match filing_status {
        FilingStatus::Single => 14_600.0,
        FilingStatus::MarriedJoint => 29_200.0,
        FilingStatus::MarriedSeparate => 14_600.0,
        FilingStatus::HeadHousehold => 21_900.0,
    }
}

/// `deductions` replaces the standard deduction when supplied.
pub fn calculate_taxable_income(
    gross_income: f64,
    filing_status: FilingStatus,
    deductions: Option<f64>,
) -> f64 {
    let deductions = deductions
        .unwrap_or_else(|| standard_deduction(filing_status))
        .max(0.0);
    (gross_income - deductions).max(0.0)
}

pub fn calculate_effective_tax_rate(
    gross_income: f64,
    filing_status: FilingStatus,
    deductions: Option<f64>,
) -> f64 {
    if gross_income <= 0.0 {
        return 0.0;
    }
    let taxable_income = calculate_taxable_income(gross_income, filing_status, deductions);
    calculate_federal_tax(taxable_income, filing_status) / gross_income
}

/// Tax owed on gross income after the standard deduction.
pub fn tax_on_gross_income(gross_income: f64, filing_status: FilingStatus) -> f64 {
    calculate_federal_tax(
        calculate_taxable_income(gross_income, filing_status, None),
        filing_status,
    )
}
