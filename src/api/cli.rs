use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crate::core::{
    Assumptions, DEFAULT_RUNS, DEFAULT_SEED, MAX_RUNS, MAX_YEARS, PortfolioInputs, ScenarioInputs, WithdrawalGoal,
    WithdrawalPlan, WithdrawalSolveConfig, calculate_sustainable_withdrawal_rate_with,
    evaluate_scenario, run_monte_carlo_simulation, solve_withdrawal_goal,
};

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Retirement projections: federal tax, Social Security, healthcare and Monte Carlo portfolio paths"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Monte Carlo projection of a single portfolio.
    Simulate(SimulateArgs),
    /// Score a fixed spending need, or solve for the sustainable rate.
    WithdrawalRate(WithdrawalRateArgs),
    /// Evaluate a full scenario from a JSON file.
    Scenario {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[arg(long)]
    pub starting_balance: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        allow_hyphen_values = true,
        help = "Added each year; negative values withdraw"
    )]
    pub annual_contribution: f64,
    #[arg(long)]
    pub years: u32,
    #[arg(
        long,
        default_value_t = 7.0,
        allow_hyphen_values = true,
        help = "Mean annual return in percent"
    )]
    pub return_mean: f64,
    #[arg(long, default_value_t = 15.0, help = "Annual return volatility in percent")]
    pub return_std: f64,
    #[arg(long, default_value_t = DEFAULT_RUNS)]
    pub runs: u32,
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
    #[arg(long, default_value_t = 0, help = "Only labels the yearly projections")]
    pub start_age: u32,
}

#[derive(Args, Debug, Clone)]
pub struct WithdrawalRateArgs {
    #[arg(long)]
    pub balance: f64,
    #[arg(long, default_value_t = 0.0)]
    pub annual_expenses: f64,
    #[arg(long)]
    pub years: u32,
    #[arg(long, help = "Bisect for the highest rate meeting --target-success")]
    pub solve: bool,
    #[arg(long, default_value_t = 90.0, help = "Target success probability in percent")]
    pub target_success: f64,
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
}

/// Values the HTTP API starts from before applying payload overrides.
pub(crate) fn default_simulate_args() -> SimulateArgs {
    SimulateArgs {
        starting_balance: 500_000.0,
        annual_contribution: 0.0,
        years: 30,
        return_mean: 7.0,
        return_std: 15.0,
        runs: DEFAULT_RUNS,
        seed: DEFAULT_SEED,
        start_age: 0,
    }
}

pub(crate) fn build_portfolio_inputs(args: &SimulateArgs) -> Result<PortfolioInputs, String> {
    if !args.starting_balance.is_finite() || args.starting_balance < 0.0 {
        return Err("--starting-balance must be >= 0".to_string());
    }
    if !args.annual_contribution.is_finite() {
        return Err("--annual-contribution must be finite".to_string());
    }
    if args.runs == 0 {
        return Err("--runs must be > 0".to_string());
    }
    if args.runs > MAX_RUNS {
        return Err(format!("--runs must be <= {MAX_RUNS}"));
    }
    if args.years > MAX_YEARS {
        return Err(format!("--years must be <= {MAX_YEARS}"));
    }
    if !args.return_mean.is_finite() || args.return_mean <= -100.0 {
        return Err("--return-mean must be > -100".to_string());
    }
    if !args.return_std.is_finite() || args.return_std < 0.0 {
        return Err("--return-std must be >= 0".to_string());
    }

    let mut inputs = PortfolioInputs::new(
        args.starting_balance,
        args.annual_contribution,
        args.years,
        args.return_mean / 100.0,
        args.return_std / 100.0,
    )
    .with_runs(args.runs)
    .with_seed(args.seed);
    inputs.start_age = args.start_age;
    Ok(inputs)
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("failed to encode output: {e}"))
}

/// Runs a one-shot subcommand and returns its pretty-printed JSON output.
pub fn run_command(command: Command) -> Result<String, String> {
    match command {
        Command::Serve { .. } => Err("serve runs on the async runtime; use run_http_server".to_string()),
        Command::Simulate(args) => {
            let inputs = build_portfolio_inputs(&args)?;
            let results = run_monte_carlo_simulation(&inputs).map_err(|e| e.to_string())?;
            to_pretty_json(&results)
        }
        Command::WithdrawalRate(args) => run_withdrawal_rate(&args),
        Command::Scenario { file } => {
            let raw = fs::read_to_string(&file)
                .map_err(|e| format!("failed to read {}: {e}", file.display()))?;
            let inputs: ScenarioInputs = serde_json::from_str(&raw)
                .map_err(|e| format!("invalid scenario JSON in {}: {e}", file.display()))?;
            let results = evaluate_scenario(&inputs).map_err(|e| e.to_string())?;
            to_pretty_json(&results)
        }
    }
}

fn run_withdrawal_rate(args: &WithdrawalRateArgs) -> Result<String, String> {
    if !(0.0..=100.0).contains(&args.target_success) {
        return Err("--target-success must be between 0 and 100".to_string());
    }

    if args.solve {
        let plan = WithdrawalPlan {
            balance: args.balance,
            annual_expenses: args.annual_expenses,
            years: args.years,
        };
        let config = WithdrawalSolveConfig {
            goal: WithdrawalGoal::MaxWithdrawalRate,
            target_success_probability: args.target_success / 100.0,
            seed: args.seed,
            ..WithdrawalSolveConfig::default()
        };
        let result = solve_withdrawal_goal(&plan, config).map_err(|e| e.to_string())?;
        return to_pretty_json(&result);
    }

    let assumptions = Assumptions {
        seed: args.seed,
        ..Assumptions::default()
    };
    let result = calculate_sustainable_withdrawal_rate_with(
        args.balance,
        args.annual_expenses,
        args.years,
        &assumptions,
    )
    .map_err(|e| e.to_string())?;
    to_pretty_json(&result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn simulate_flags_parse_and_convert_percentages() {
        let cli = Cli::try_parse_from([
            "nestegg",
            "simulate",
            "--starting-balance",
            "100000",
            "--annual-contribution",
            "-4000",
            "--years",
            "20",
            "--return-mean",
            "6",
            "--return-std",
            "12",
            "--runs",
            "250",
        ])
        .expect("flags should parse");

        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        let inputs = build_portfolio_inputs(&args).expect("valid args");
        assert_approx(inputs.starting_balance, 100_000.0);
        assert_approx(inputs.annual_contribution, -4_000.0);
        assert_eq!(inputs.years, 20);
        assert_approx(inputs.return_mean, 0.06);
        assert_approx(inputs.return_std, 0.12);
        assert_eq!(inputs.runs, 250);
        assert_eq!(inputs.seed, DEFAULT_SEED);
    }

    #[test]
    fn serve_defaults_to_port_8080() {
        let cli = Cli::try_parse_from(["nestegg", "serve"]).expect("flags should parse");
        assert!(matches!(cli.command, Command::Serve { port: 8080 }));
    }

    #[test]
    fn build_portfolio_inputs_rejects_bad_values() {
        let mut args = default_simulate_args();
        args.runs = 0;
        assert_eq!(
            build_portfolio_inputs(&args).expect_err("runs"),
            "--runs must be > 0"
        );

        let mut args = default_simulate_args();
        args.return_std = -1.0;
        assert!(build_portfolio_inputs(&args).is_err());

        let mut args = default_simulate_args();
        args.starting_balance = -10.0;
        assert!(build_portfolio_inputs(&args).is_err());
    }

    #[test]
    fn build_portfolio_inputs_caps_years_and_runs() {
        let mut args = default_simulate_args();
        args.years = u32::MAX;
        assert_eq!(
            build_portfolio_inputs(&args).expect_err("years"),
            "--years must be <= 150"
        );

        let mut args = default_simulate_args();
        args.runs = MAX_RUNS + 1;
        assert_eq!(
            build_portfolio_inputs(&args).expect_err("runs"),
            "--runs must be <= 100000"
        );

        let mut args = default_simulate_args();
        args.years = MAX_YEARS;
        args.runs = MAX_RUNS;
        assert!(build_portfolio_inputs(&args).is_ok());
    }

    #[test]
    fn withdrawal_rate_command_prints_rate_and_probability() {
        let output = run_command(Command::WithdrawalRate(WithdrawalRateArgs {
            balance: 1_000_000.0,
            annual_expenses: 40_000.0,
            years: 30,
            solve: false,
            target_success: 90.0,
            seed: DEFAULT_SEED,
        }))
        .expect("command should succeed");

        let value: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        assert_eq!(value["rate"].as_f64(), Some(0.04));
        assert!(value["successProbability"].as_f64().is_some());
    }

    #[test]
    fn scenario_command_reports_missing_file() {
        let err = run_command(Command::Scenario {
            file: PathBuf::from("/nonexistent/scenario.json"),
        })
        .expect_err("missing file");
        assert!(err.contains("failed to read"));
    }
}
