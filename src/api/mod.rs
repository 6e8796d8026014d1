mod params;

pub use params::{
    DepletionArgs, DepletionInputs, InputError, ProjectionArgs, RulesArgs,
    build_depletion_inputs, build_projection_inputs,
};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::core::{
    CashflowSummary, CategoryShare, DepletionTrace, GoalPlan, NetWorthSummary, ProjectionResult,
    ProjectionRules, asset_breakdown, cashflow_summary, category_totals, future_value, goal_plan,
    lump_sum_maturity, net_worth, project_accumulation, sip_paying_amount_required,
    simulate_depletion_trace,
};
use crate::planner::{RetirementPlanner, RetirementReport};
use crate::records::{
    CASHFLOW_KEY, CashflowSheet, GOALS_KEY, GoalsSheet, NET_WORTH_KEY, NetWorthSheet,
};
use crate::store::{KeyValueStore, StoreError, load_or_default};
use params::{
    DepletionPayload, FormulaPayload, ProjectionPayload, default_depletion_args,
    default_projection_args, depletion_args_from_payload, projection_args_from_payload,
};

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn KeyValueStore>,
    planner: Arc<RetirementPlanner>,
}

impl AppState {
    pub fn new(store: Arc<dyn KeyValueStore>, rules: ProjectionRules) -> Self {
        let planner = Arc::new(RetirementPlanner::new(store.clone(), rules));
        Self { store, planner }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Input(InputError),
    Store(StoreError),
    NotFound(String),
    Internal(String),
}

impl From<InputError> for ApiError {
    fn from(value: InputError) -> Self {
        ApiError::Input(value)
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        ApiError::Store(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Input(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
            ApiError::Store(err @ StoreError::InvalidKey(_)) => {
                error_response(StatusCode::BAD_REQUEST, &err.to_string())
            }
            ApiError::Store(err) => {
                error!(error = %err, "store request failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
            }
            ApiError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, &msg),
            ApiError::Internal(msg) => {
                error!(error = %msg, "blocking task failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, &msg)
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionResponse {
    rules: ProjectionRules,
    #[serde(flatten)]
    result: ProjectionResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DepletionResponse {
    allocation_total: f64,
    allocation_valid: bool,
    #[serde(flatten)]
    trace: DepletionTrace,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormulaResponse {
    future_value: f64,
    sip_monthly_payment: f64,
    lump_sum_maturity: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    net_worth: NetWorthSummary,
    asset_breakdown: Vec<CategoryShare>,
    liability_breakdown: Vec<CategoryShare>,
    cashflow: CashflowSummary,
    income_breakdown: Vec<CategoryShare>,
    expense_breakdown: Vec<CategoryShare>,
    goals: Vec<GoalPlan>,
}

#[derive(Debug, Serialize)]
struct SavedResponse {
    key: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/projection",
            get(projection_get_handler).post(projection_post_handler),
        )
        .route(
            "/api/depletion",
            get(depletion_get_handler).post(depletion_post_handler),
        )
        .route(
            "/api/formulas",
            get(formulas_get_handler).post(formulas_post_handler),
        )
        .route("/api/retirement", get(retirement_handler))
        .route("/api/summary", get(summary_handler))
        .route(
            "/api/store/:key",
            get(store_get_handler).put(store_put_handler),
        )
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16, state: AppState) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tokio::spawn(state.planner.clone().watch(state.store.subscribe()));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "nestplan HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/api/retirement");

    axum::serve(listener, router(state)).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn projection_get_handler(Query(payload): Query<ProjectionPayload>) -> Response {
    respond(run_projection(payload))
}

async fn projection_post_handler(Json(payload): Json<ProjectionPayload>) -> Response {
    respond(run_projection(payload))
}

async fn depletion_get_handler(Query(payload): Query<DepletionPayload>) -> Response {
    respond(run_depletion(payload))
}

async fn depletion_post_handler(Json(payload): Json<DepletionPayload>) -> Response {
    respond(run_depletion(payload))
}

async fn formulas_get_handler(Query(payload): Query<FormulaPayload>) -> Response {
    json_response(StatusCode::OK, run_formulas(payload))
}

async fn formulas_post_handler(Json(payload): Json<FormulaPayload>) -> Response {
    json_response(StatusCode::OK, run_formulas(payload))
}

async fn retirement_handler(State(state): State<AppState>) -> Response {
    let planner = state.planner.clone();
    respond(off_runtime(move || Ok::<RetirementReport, ApiError>(planner.report())).await)
}

async fn summary_handler(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    respond(off_runtime(move || Ok(build_summary(store.as_ref()))).await)
}

async fn store_get_handler(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    let store = state.store.clone();
    respond(off_runtime(move || read_blob(store.as_ref(), &key)).await)
}

async fn store_put_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> Response {
    let store = state.store.clone();
    respond(
        off_runtime(move || {
            store.set(&key, &value)?;
            Ok(SavedResponse { key })
        })
        .await,
    )
}

/// Store access may hit the filesystem, so it runs on the blocking pool.
async fn off_runtime<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
}

fn run_projection(payload: ProjectionPayload) -> Result<ProjectionResponse, ApiError> {
    let args = projection_args_from_payload(payload, default_projection_args());
    let inputs = build_projection_inputs(&args)?;
    Ok(ProjectionResponse {
        rules: inputs.rules,
        result: project_accumulation(&inputs),
    })
}

fn run_depletion(payload: DepletionPayload) -> Result<DepletionResponse, ApiError> {
    let args = depletion_args_from_payload(payload, default_depletion_args());
    let inputs = build_depletion_inputs(&args)?;
    let trace = simulate_depletion_trace(
        inputs.starting_corpus,
        inputs.plan,
        &inputs.allocation,
        &inputs.returns,
        inputs.inflation_percent,
        inputs.max_years,
    );
    Ok(DepletionResponse {
        allocation_total: inputs.allocation.total(),
        allocation_valid: inputs.allocation.is_complete(),
        trace,
    })
}

fn run_formulas(payload: FormulaPayload) -> FormulaResponse {
    let rate = payload.rate.unwrap_or(0.0);
    let years = payload.years.unwrap_or(0.0);
    FormulaResponse {
        future_value: future_value(payload.present_value.unwrap_or(0.0), rate, years),
        sip_monthly_payment: sip_paying_amount_required(
            payload.target_future_value.unwrap_or(0.0),
            rate,
            years,
        ),
        lump_sum_maturity: lump_sum_maturity(payload.yearly_investment.unwrap_or(0.0), rate, years),
    }
}

fn build_summary(store: &dyn KeyValueStore) -> SummaryResponse {
    let worth: NetWorthSheet = load_or_default(store, NET_WORTH_KEY);
    let cashflow: CashflowSheet = load_or_default(store, CASHFLOW_KEY);
    let goals: GoalsSheet = load_or_default(store, GOALS_KEY);

    SummaryResponse {
        net_worth: net_worth(&worth.assets, &worth.liabilities),
        asset_breakdown: asset_breakdown(&worth.assets),
        liability_breakdown: category_totals(&worth.liabilities),
        cashflow: cashflow_summary(&cashflow.incomes, &cashflow.expenses),
        income_breakdown: category_totals(&cashflow.incomes),
        expense_breakdown: category_totals(&cashflow.expenses),
        goals: goals
            .goals
            .iter()
            .map(|goal| goal_plan(goal, goals.inflation_percent))
            .collect(),
    }
}

fn read_blob(store: &dyn KeyValueStore, key: &str) -> Result<Value, ApiError> {
    match store.read(key)? {
        None => Err(ApiError::NotFound(format!("no value stored for {key:?}"))),
        // A malformed blob reads as null rather than failing the page.
        Some(_) => Ok(store.get(key).unwrap_or(Value::Null)),
    }
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => err.into_response(),
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
