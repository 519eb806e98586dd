use axum::{
    Router, async_trait,
    extract::{FromRequest, FromRequestParts, Json, Query, Request},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::net::SocketAddr;
use tokio::net::TcpListener;

mod cli;

pub use cli::{Cli, Command, SimulateArgs, WithdrawalRateArgs, run_command};

use crate::core::{
    DEFAULT_BENCHMARK_PREMIUM, DEFAULT_FULL_RETIREMENT_AGE, DEFAULT_MEDICARE_AGE, EngineError,
    FilingStatus, MAX_YEARS, PortfolioInputs, ScenarioInputs, TaxBracket, WithdrawalPlan,
    WithdrawalSolveConfig, build_cashflow_plan, calculate_aca_subsidy,
    calculate_effective_tax_rate, calculate_federal_tax, calculate_healthcare_costs,
    calculate_pia, calculate_social_security_benefit, calculate_sustainable_withdrawal_rate,
    calculate_taxable_income, evaluate_scenario, federal_brackets, full_retirement_age,
    run_deterministic_projection, run_monte_carlo_simulation, solve_withdrawal_goal,
    standard_deduction,
};
use cli::{build_portfolio_inputs, default_simulate_args};

/// Overrides for the default simulation. Returns are in percent, matching
/// the CLI flags.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    starting_balance: Option<f64>,
    annual_contribution: Option<f64>,
    years: Option<u32>,
    return_mean: Option<f64>,
    return_std: Option<f64>,
    runs: Option<u32>,
    seed: Option<u64>,
    start_age: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionPayload {
    starting_balance: f64,
    #[serde(default)]
    annual_contribution: f64,
    years: u32,
    /// Fraction, e.g. 0.07.
    annual_return: f64,
}

#[derive(Debug, Serialize)]
struct ProjectionResponse {
    balances: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawalRatePayload {
    balance: f64,
    annual_expenses: f64,
    years: u32,
}

#[derive(Debug, Deserialize)]
struct SolvePayload {
    #[serde(flatten)]
    plan: WithdrawalPlan,
    #[serde(default)]
    config: WithdrawalSolveConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaxQuery {
    income: f64,
    #[serde(default)]
    filing_status: Option<String>,
    #[serde(default)]
    deductions: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaxSummary {
    filing_status: FilingStatus,
    gross_income: f64,
    deduction: f64,
    taxable_income: f64,
    federal_tax: f64,
    effective_rate: f64,
    brackets: &'static [TaxBracket],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocialSecurityQuery {
    aime: f64,
    claiming_age: f64,
    #[serde(default)]
    birth_year: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SocialSecuritySummary {
    aime: f64,
    pia: f64,
    full_retirement_age: f64,
    claiming_age: f64,
    monthly_benefit: f64,
    annual_benefit: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthcareQuery {
    age: u32,
    #[serde(default)]
    medicare_age: Option<u32>,
    #[serde(default)]
    income: Option<f64>,
    #[serde(default)]
    household_size: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthcareSummary {
    age: u32,
    medicare_eligible: bool,
    annual_cost: f64,
    aca_subsidy: f64,
    net_annual_cost: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// `Json` whose rejection is the API's 400 JSON error instead of axum's
/// plain-text 4xx.
struct ApiJson<T>(T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(bad_payload(&rejection.body_text())),
        }
    }
}

struct ApiQuery<T>(T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(bad_payload(&rejection.body_text())),
        }
    }
}

fn bad_payload(msg: &str) -> Response {
    log::debug!("rejected payload: {msg}");
    error_response(StatusCode::BAD_REQUEST, msg)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    println!("nestegg HTTP API listening on http://{addr}");
    log::info!("serving on port {port}");

    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/projection", post(projection_handler))
        .route("/api/withdrawal-rate", post(withdrawal_rate_handler))
        .route("/api/withdrawal-rate/solve", post(withdrawal_solve_handler))
        .route("/api/scenario", post(scenario_handler))
        .route("/api/scenario/plan", post(scenario_plan_handler))
        .route("/api/tax", get(tax_handler))
        .route("/api/social-security", get(social_security_handler))
        .route("/api/healthcare", get(healthcare_handler))
        .fallback(not_found_handler)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(ApiQuery(payload): ApiQuery<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(ApiJson(payload): ApiJson<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let inputs = match portfolio_inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    engine_response(run_monte_carlo_simulation(&inputs))
}

async fn projection_handler(ApiJson(payload): ApiJson<ProjectionPayload>) -> Response {
    if !payload.starting_balance.is_finite()
        || !payload.annual_contribution.is_finite()
        || !payload.annual_return.is_finite()
    {
        return error_response(
            StatusCode::BAD_REQUEST,
            "startingBalance, annualContribution and annualReturn must be finite",
        );
    }
    if payload.years > MAX_YEARS {
        return error_response(
            StatusCode::BAD_REQUEST,
            &format!("years must be <= {MAX_YEARS}"),
        );
    }
    let balances = run_deterministic_projection(
        payload.starting_balance,
        payload.annual_contribution,
        payload.years,
        payload.annual_return,
    );
    json_response(StatusCode::OK, ProjectionResponse { balances })
}

async fn withdrawal_rate_handler(ApiJson(payload): ApiJson<WithdrawalRatePayload>) -> Response {
    engine_response(calculate_sustainable_withdrawal_rate(
        payload.balance,
        payload.annual_expenses,
        payload.years,
    ))
}

async fn withdrawal_solve_handler(ApiJson(payload): ApiJson<SolvePayload>) -> Response {
    engine_response(solve_withdrawal_goal(&payload.plan, payload.config))
}

async fn scenario_handler(ApiJson(inputs): ApiJson<ScenarioInputs>) -> Response {
    engine_response(evaluate_scenario(&inputs))
}

async fn scenario_plan_handler(ApiJson(inputs): ApiJson<ScenarioInputs>) -> Response {
    engine_response(build_cashflow_plan(&inputs))
}

async fn tax_handler(ApiQuery(query): ApiQuery<TaxQuery>) -> Response {
    match tax_summary(&query) {
        Ok(summary) => json_response(StatusCode::OK, summary),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn social_security_handler(ApiQuery(query): ApiQuery<SocialSecurityQuery>) -> Response {
    match social_security_summary(&query) {
        Ok(summary) => json_response(StatusCode::OK, summary),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn healthcare_handler(ApiQuery(query): ApiQuery<HealthcareQuery>) -> Response {
    match healthcare_summary(&query) {
        Ok(summary) => json_response(StatusCode::OK, summary),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

fn engine_response<T: Serialize>(result: Result<T, EngineError>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => {
            log::debug!("rejected request: {err}");
            error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn portfolio_inputs_from_payload(payload: SimulatePayload) -> Result<PortfolioInputs, String> {
    let mut args = default_simulate_args();

    if let Some(v) = payload.starting_balance {
        args.starting_balance = v;
    }
    if let Some(v) = payload.annual_contribution {
        args.annual_contribution = v;
    }
    if let Some(v) = payload.years {
        args.years = v;
    }
    if let Some(v) = payload.return_mean {
        args.return_mean = v;
    }
    if let Some(v) = payload.return_std {
        args.return_std = v;
    }
    if let Some(v) = payload.runs {
        args.runs = v;
    }
    if let Some(v) = payload.seed {
        args.seed = v;
    }
    if let Some(v) = payload.start_age {
        args.start_age = v;
    }

    build_portfolio_inputs(&args)
}

fn tax_summary(query: &TaxQuery) -> Result<TaxSummary, String> {
    if !query.income.is_finite() {
        return Err("income must be finite".to_string());
    }
    if let Some(deductions) = query.deductions {
        if !deductions.is_finite() || deductions < 0.0 {
            return Err("deductions must be >= 0".to_string());
        }
    }

    let filing_status = query
        .filing_status
        .as_deref()
        .map(FilingStatus::from_label)
        .unwrap_or(FilingStatus::Single);
    let taxable_income = calculate_taxable_income(query.income, filing_status, query.deductions);
    let federal_tax = calculate_federal_tax(taxable_income, filing_status);
    let effective_rate =
        calculate_effective_tax_rate(query.income, filing_status, query.deductions);

    Ok(TaxSummary {
        filing_status,
        gross_income: query.income,
        deduction: query
            .deductions
            .unwrap_or_else(|| standard_deduction(filing_status)),
        taxable_income,
        federal_tax,
        effective_rate,
        brackets: federal_brackets(filing_status),
    })
}

fn social_security_summary(query: &SocialSecurityQuery) -> Result<SocialSecuritySummary, String> {
    if !query.aime.is_finite() || query.aime < 0.0 {
        return Err("aime must be >= 0".to_string());
    }
    if !query.claiming_age.is_finite() || !(50.0..=80.0).contains(&query.claiming_age) {
        return Err("claimingAge must be between 50 and 80".to_string());
    }

    let fra = query
        .birth_year
        .map(full_retirement_age)
        .unwrap_or(DEFAULT_FULL_RETIREMENT_AGE);
    let monthly_benefit = calculate_social_security_benefit(query.aime, query.claiming_age, fra);
    Ok(SocialSecuritySummary {
        aime: query.aime,
        pia: calculate_pia(query.aime),
        full_retirement_age: fra,
        claiming_age: query.claiming_age,
        monthly_benefit,
        annual_benefit: monthly_benefit * 12.0,
    })
}

fn healthcare_summary(query: &HealthcareQuery) -> Result<HealthcareSummary, String> {
    let medicare_age = query.medicare_age.unwrap_or(DEFAULT_MEDICARE_AGE);
    let household_size = query.household_size.unwrap_or(1);
    if household_size == 0 {
        return Err("householdSize must be >= 1".to_string());
    }
    if let Some(income) = query.income {
        if !income.is_finite() || income < 0.0 {
            return Err("income must be >= 0".to_string());
        }
    }

    let medicare_eligible = query.age >= medicare_age;
    let annual_cost = calculate_healthcare_costs(query.age, medicare_age);
    let aca_subsidy = match query.income {
        Some(income) if !medicare_eligible => {
            calculate_aca_subsidy(income, household_size, DEFAULT_BENCHMARK_PREMIUM)
        }
        _ => 0.0,
    };

    Ok(HealthcareSummary {
        age: query.age,
        medicare_eligible,
        annual_cost,
        aca_subsidy,
        net_annual_cost: (annual_cost - aca_subsidy).max(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DEFAULT_SEED;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[test]
    fn simulate_payload_overrides_defaults_and_converts_percent() {
        let json = r#"{
          "startingBalance": 250000,
          "annualContribution": -10000,
          "years": 25,
          "returnMean": 6,
          "returnStd": 10,
          "runs": 321
        }"#;
        let payload: SimulatePayload = serde_json::from_str(json).expect("json should parse");
        let inputs = portfolio_inputs_from_payload(payload).expect("valid payload");

        assert_approx(inputs.starting_balance, 250_000.0);
        assert_approx(inputs.annual_contribution, -10_000.0);
        assert_eq!(inputs.years, 25);
        assert_approx(inputs.return_mean, 0.06);
        assert_approx(inputs.return_std, 0.10);
        assert_eq!(inputs.runs, 321);
        assert_eq!(inputs.seed, DEFAULT_SEED);
    }

    #[test]
    fn empty_simulate_payload_uses_defaults() {
        let inputs =
            portfolio_inputs_from_payload(SimulatePayload::default()).expect("defaults are valid");
        assert_approx(inputs.starting_balance, 500_000.0);
        assert_approx(inputs.return_mean, 0.07);
        assert_approx(inputs.return_std, 0.15);
    }

    #[test]
    fn simulate_payload_rejects_zero_runs() {
        let payload = SimulatePayload {
            runs: Some(0),
            ..SimulatePayload::default()
        };
        assert!(portfolio_inputs_from_payload(payload).is_err());
    }

    #[test]
    fn tax_summary_applies_standard_deduction_and_label() {
        let summary = tax_summary(&TaxQuery {
            income: 64_600.0,
            filing_status: Some("single".to_string()),
            deductions: None,
        })
        .expect("valid query");
        assert_eq!(summary.filing_status, FilingStatus::Single);
        assert_approx(summary.deduction, 14_600.0);
        assert_approx(summary.taxable_income, 50_000.0);
        assert_approx(summary.federal_tax, 6_053.0);
        assert_eq!(summary.brackets.len(), 7);

        let joint = tax_summary(&TaxQuery {
            income: 129_200.0,
            filing_status: Some("married_joint".to_string()),
            deductions: None,
        })
        .expect("valid query");
        assert_approx(joint.federal_tax, 12_106.0);
    }

    #[test]
    fn social_security_summary_uses_birth_year_fra() {
        let summary = social_security_summary(&SocialSecurityQuery {
            aime: 5_000.0,
            claiming_age: 66.5,
            birth_year: Some(1957),
        })
        .expect("valid query");
        assert_approx(summary.full_retirement_age, 66.5);
        assert_approx(summary.monthly_benefit, summary.pia);
        assert_approx(summary.annual_benefit, summary.pia * 12.0);

        assert!(
            social_security_summary(&SocialSecurityQuery {
                aime: -1.0,
                claiming_age: 67.0,
                birth_year: None,
            })
            .is_err()
        );
    }

    #[test]
    fn healthcare_summary_nets_subsidy_before_medicare_only() {
        let early = healthcare_summary(&HealthcareQuery {
            age: 62,
            medicare_age: None,
            income: Some(20_000.0),
            household_size: None,
        })
        .expect("valid query");
        assert!(!early.medicare_eligible);
        assert_approx(early.annual_cost, 14_000.0);
        assert_approx(early.aca_subsidy, 8_000.0);
        assert_approx(early.net_annual_cost, 6_000.0);

        let medicare = healthcare_summary(&HealthcareQuery {
            age: 70,
            medicare_age: None,
            income: Some(20_000.0),
            household_size: None,
        })
        .expect("valid query");
        assert!(medicare.medicare_eligible);
        assert_approx(medicare.aca_subsidy, 0.0);
    }

    #[tokio::test]
    async fn withdrawal_rate_handler_returns_no_store_json() {
        let response = withdrawal_rate_handler(ApiJson(WithdrawalRatePayload {
            balance: 1_000_000.0,
            annual_expenses: 40_000.0,
            years: 30,
        }))
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CACHE_CONTROL)
                .and_then(|v| v.to_str().ok()),
            Some("no-store")
        );
        let body = body_json(response).await;
        assert_eq!(body["rate"].as_f64(), Some(0.04));
    }

    #[tokio::test]
    async fn engine_errors_map_to_bad_request() {
        let response = simulate_handler_impl(SimulatePayload {
            return_std: Some(-5.0),
            ..SimulatePayload::default()
        })
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().is_some_and(|msg| msg.contains("return-std")));
    }

    #[tokio::test]
    async fn simulate_response_serialization_contains_expected_fields() {
        let response = simulate_handler_impl(SimulatePayload {
            years: Some(5),
            runs: Some(50),
            ..SimulatePayload::default()
        })
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        for key in [
            "successProbability",
            "medianEndingBalance",
            "worstCaseBalance",
            "sustainableWithdrawalRate",
            "yearlyProjections",
            "percentiles",
        ] {
            assert!(body.get(key).is_some(), "missing {key}");
        }
        assert_eq!(body["percentiles"].as_array().map(Vec::len), Some(6));
        assert!(body["percentiles"][0].get("p90").is_some());
    }

    #[tokio::test]
    async fn projection_handler_returns_compounded_balances() {
        let response = projection_handler(ApiJson(ProjectionPayload {
            starting_balance: 100.0,
            annual_contribution: 10.0,
            years: 2,
            annual_return: 0.10,
        }))
        .await;
        let body = body_json(response).await;
        let balances: Vec<f64> = body["balances"]
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|v| v.as_f64())
            .collect();
        assert_eq!(balances.len(), 3);
        assert_approx(balances[2], 142.0);
    }

    #[tokio::test]
    async fn not_found_is_json() {
        let response = not_found_handler().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"].as_str(), Some("Not found"));
    }

    #[test]
    fn solve_payload_accepts_flattened_plan_with_default_config() {
        let payload: SolvePayload =
            serde_json::from_str(r#"{"balance": 1000000, "years": 30}"#).expect("json should parse");
        assert_approx(payload.plan.balance, 1_000_000.0);
        assert_eq!(payload.plan.years, 30);
        assert_eq!(payload.config, WithdrawalSolveConfig::default());
    }

    #[test]
    fn router_builds() {
        let _ = router();
    }

    async fn send(method: &str, uri: &str, body: &str) -> Response {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build");
        router().oneshot(request).await.expect("router is infallible")
    }

    async fn assert_bad_request(response: Response, mentions: &str) {
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
        let body = body_json(response).await;
        let msg = body["error"].as_str().unwrap_or_default();
        assert!(msg.contains(mentions), "{msg:?} should mention {mentions}");
    }

    #[tokio::test]
    async fn missing_json_field_is_a_json_bad_request() {
        let response = send("POST", "/api/withdrawal-rate", r#"{"balance": 1000000}"#).await;
        assert_bad_request(response, "annualExpenses").await;
    }

    #[tokio::test]
    async fn malformed_json_is_a_json_bad_request() {
        let response = send("POST", "/api/scenario", "{not json").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn bad_query_is_a_json_bad_request() {
        let response = send("GET", "/api/tax?income=lots", "").await;
        assert_bad_request(response, "income").await;

        let response = send("GET", "/api/healthcare", "").await;
        assert_bad_request(response, "age").await;
    }

    #[tokio::test]
    async fn router_serves_valid_requests() {
        let response = send(
            "POST",
            "/api/withdrawal-rate",
            r#"{"balance": 1000000, "annualExpenses": 40000, "years": 30}"#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["rate"].as_f64(), Some(0.04));

        let response = send("GET", "/api/tax?income=64600&filingStatus=single", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_approx(
            body_json(response).await["federalTax"].as_f64().unwrap_or_default(),
            6_053.0,
        );
    }

    #[tokio::test]
    async fn oversized_horizons_and_runs_are_rejected() {
        let response = send(
            "POST",
            "/api/projection",
            r#"{"startingBalance": 1, "years": 4294967295, "annualReturn": 0.05}"#,
        )
        .await;
        assert_bad_request(response, "years").await;

        let response = send("POST", "/api/simulate", r#"{"runs": 4000000000}"#).await;
        assert_bad_request(response, "--runs").await;

        let response = send(
            "POST",
            "/api/withdrawal-rate",
            r#"{"balance": 1000000, "annualExpenses": 40000, "years": 4294967295}"#,
        )
        .await;
        assert_bad_request(response, "years").await;
    }

    #[tokio::test]
    async fn inverted_guardrail_assumptions_are_a_bad_request() {
        let body = r#"{
          "profile": { "currentAge": 60, "birthYear": 1966, "horizonAge": 70, "filingStatus": "single" },
          "scenario": {
            "retirementAge": 60,
            "essentialSpending": 30000,
            "discretionarySpending": 10000,
            "withdrawalStrategy": "guardrails",
            "socialSecurityStrategy": "full",
            "expectedReturn": 0.05,
            "inflationRate": 0.02
          },
          "accounts": [ { "currentBalance": 800000, "taxTreatment": "post-tax" } ],
          "runs": 20,
          "assumptions": {
            "guardrails": { "minDiscretionaryMultiplier": 1.5, "maxDiscretionaryMultiplier": 1.0 }
          }
        }"#;
        let response = send("POST", "/api/scenario", body).await;
        assert_bad_request(response, "minDiscretionaryMultiplier").await;
    }

    #[test]
    fn tax_summary_rate_matches_the_library_rate() {
        let summary = tax_summary(&TaxQuery {
            income: 80_000.0,
            filing_status: None,
            deductions: Some(0.0),
        })
        .expect("valid query");
        assert_approx(
            summary.effective_rate,
            calculate_effective_tax_rate(80_000.0, FilingStatus::Single, Some(0.0)),
        );
        assert_approx(summary.effective_rate, summary.federal_tax / 80_000.0);
    }
}
