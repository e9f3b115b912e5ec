use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use crate::openai::OpenAiClient;
use nutrack_core::models::{
    DailyProgress, GoalEntry, LogEntry, Nutrient, UserProfile, ValidationError,
};
use nutrack_core::service::NutrientService;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    service: Arc<Mutex<NutrientService>>,
    advisor: Option<Arc<OpenAiClient>>,
    api_key: Option<String>,
}

impl AppState {
    fn service(&self) -> MutexGuard<'_, NutrientService> {
        self.service.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

/// Amounts arrive either as numbers or as raw text typed by the user.
#[derive(Deserialize)]
#[serde(untagged)]
enum AmountInput {
    Number(f64),
    Text(String),
}

#[derive(Deserialize)]
struct CreateLogRequest {
    nutrient_id: String,
    amount: AmountInput,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct LogsQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
struct SetGoalRequest {
    max_value: f64,
    name: Option<String>,
    unit: Option<String>,
}

#[derive(Serialize)]
struct AiGoalResponse {
    goal: Option<String>,
    updated: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<ValidationError>() {
            Some(invalid) => Self::BadRequest(invalid.to_string()),
            None => Self::Internal(err),
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD")))
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn list_nutrients(State(state): State<AppState>) -> Json<Vec<Nutrient>> {
    Json(state.service().catalog().list().to_vec())
}

async fn create_log(
    State(state): State<AppState>,
    Json(req): Json<CreateLogRequest>,
) -> Result<Response, ApiError> {
    let service = state.service();
    let entry = match (req.amount, req.timestamp) {
        (AmountInput::Number(amount), Some(ts)) => {
            Some(service.log_nutrient_at(&req.nutrient_id, amount, ts)?)
        }
        (AmountInput::Number(amount), None) => {
            Some(service.log_nutrient(&req.nutrient_id, amount)?)
        }
        (AmountInput::Text(raw), _) => service.log_input(&req.nutrient_id, &raw)?,
    };

    Ok(match entry {
        Some(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let date = query.date.as_deref().map(parse_date).transpose()?;
    let service = state.service();
    let boundary = service.boundary();
    let mut logs = service.logs()?;
    if let Some(date) = date {
        logs.retain(|e| boundary.day_of(e.timestamp) == date);
    }
    Ok(Json(logs))
}

async fn clear_logs(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state.service().clear_logs()?;
    Ok(Json(serde_json::json!({ "cleared": removed })))
}

async fn progress_today(State(state): State<AppState>) -> Result<Json<DailyProgress>, ApiError> {
    let service = state.service();
    let today = service.today();
    Ok(Json(service.daily_progress(today)?))
}

async fn progress_for_date(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DailyProgress>, ApiError> {
    let date = parse_date(&date)?;
    Ok(Json(state.service().daily_progress(date)?))
}

async fn list_goals(State(state): State<AppState>) -> Result<Json<Vec<GoalEntry>>, ApiError> {
    Ok(Json(state.service().list_goals()?))
}

async fn set_goal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetGoalRequest>,
) -> Result<Json<GoalEntry>, ApiError> {
    let service = state.service();
    let goal = match (req.name, req.unit) {
        (Some(name), Some(unit)) => service.set_goal_entry(&id, &name, &unit, req.max_value)?,
        (None, None) => service.set_goal(&id, req.max_value)?,
        _ => {
            return Err(ApiError::BadRequest(
                "name and unit must be given together".to_string(),
            ));
        }
    };
    Ok(Json(goal))
}

async fn delete_goal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.service().remove_goal(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("No goal set for '{id}'")))
    }
}

async fn get_profile(State(state): State<AppState>) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.service().profile()?))
}

async fn put_profile(
    State(state): State<AppState>,
    Json(profile): Json<UserProfile>,
) -> Result<Json<UserProfile>, ApiError> {
    let service = state.service();
    service.set_profile(&profile)?;
    Ok(Json(service.profile()?))
}

async fn get_ai_goal(State(state): State<AppState>) -> Result<Json<AiGoalResponse>, ApiError> {
    Ok(Json(AiGoalResponse {
        goal: state.service().ai_goal()?,
        updated: false,
    }))
}

async fn refresh_ai_goal(State(state): State<AppState>) -> Result<Json<AiGoalResponse>, ApiError> {
    let advisor = state.advisor.clone().ok_or_else(|| {
        ApiError::BadRequest("AI advisor is not configured (set OPENAI_API_KEY)".to_string())
    })?;

    // the service lock must not be held across the HTTP call
    let prompt = state.service().prepare_ai_prompt()?;
    let outcome = advisor.recommend(&prompt).await;

    let service = state.service();
    let updated = service.record_ai_goal(outcome)?.is_some();
    Ok(Json(AiGoalResponse {
        goal: service.ai_goal()?,
        updated,
    }))
}

// --- Router ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/nutrients", get(list_nutrients))
        .route(
            "/api/logs",
            get(list_logs).post(create_log).delete(clear_logs),
        )
        .route("/api/progress", get(progress_today))
        .route("/api/progress/{date}", get(progress_for_date))
        .route("/api/goals", get(list_goals))
        .route("/api/goals/{id}", put(set_goal).delete(delete_goal))
        .route("/api/profile", get(get_profile).put(put_profile))
        .route("/api/ai-goal", get(get_ai_goal).post(refresh_ai_goal))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    service: NutrientService,
    advisor: Option<OpenAiClient>,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        service: Arc::new(Mutex::new(service)),
        advisor: advisor.map(Arc::new),
        api_key: api_key.clone(),
    };
    if state.advisor.is_none() {
        tracing::info!("OPENAI_API_KEY not set, POST /api/ai-goal is disabled");
    }

    let app = build_router(state);

    match api_key.as_deref() {
        Some(key) if key.len() >= 8 => eprintln!(
            "API key: {}...{} (see api_key file in data directory)",
            &key[..4],
            &key[key.len() - 4..],
        ),
        Some(_) => eprintln!("API key loaded from the api_key file in the data directory"),
        None => {
            tracing::warn!("authentication disabled (--no-auth), the API is open to anyone");
        }
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        tracing::warn!(
            bind,
            "listening with no authentication, any device on your network can access this API"
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    tracing::info!("listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
