// Member Registry - REST API server
// Admin endpoints over the member registry, JSON in and out

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{Local, NaiveDate};
use member_registry::{
    get_events_for_entity, list_members, setup_database, Config, Event, FieldError,
    IdentityNumber, Member, MemberInput, MemberQuery, MemberRegistry, MemberStatus,
    RegistryError,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

const API_ACTOR: &str = "api";

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    config: Arc<Config>,
}

impl AppState {
    fn new(conn: Connection, config: Config) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::internal("database lock poisoned"))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

struct ApiError {
    status: StatusCode,
    message: String,
    fields: Vec<FieldError>,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    fn invalid(fields: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "The given data was invalid.".to_string(),
            fields,
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Validation(fields) => ApiError::invalid(fields),
            RegistryError::Duplicate { field, message } => Self {
                status: StatusCode::CONFLICT,
                fields: vec![FieldError::new(&field, "unique", message.clone())],
                message,
            },
            RegistryError::NotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                message: err.to_string(),
                fields: Vec::new(),
            },
            RegistryError::GenerationExhausted { .. } => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: err.to_string(),
                fields: Vec::new(),
            },
            other => {
                tracing::error!(error = %other, "request failed");
                ApiError::internal("internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse {
            success: false,
            data: self.fields,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn registry<'c>(conn: &'c Connection, config: &Config) -> MemberRegistry<'c> {
    MemberRegistry::from_config(conn, config).actor(API_ACTOR)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    search: Option<String>,
    cellphone: Option<String>,
    status: Option<String>,
}

/// GET /api/members - List members, newest first
async fn get_members(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<Member>> {
    let status = match params.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<MemberStatus>().map_err(|_| {
            ApiError::invalid(vec![FieldError::new(
                "status",
                "in",
                "The status must be one of: active, inactive, suspended.",
            )])
        })?),
    };

    let query = MemberQuery::new()
        .search(params.search.as_deref())
        .cellphone(params.cellphone.as_deref())
        .status(status);

    let conn = state.lock()?;
    let members = list_members(&conn, &query)?;
    Ok(Json(ApiResponse::ok(members)))
}

/// POST /api/members - Register a member
async fn create_member(
    State(state): State<AppState>,
    Json(input): Json<MemberInput>,
) -> Result<(StatusCode, Json<ApiResponse<Member>>), ApiError> {
    let conn = state.lock()?;
    let member = registry(&conn, &state.config).register(&input, today())?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(member))))
}

/// GET /api/members/:id
async fn get_member(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Member> {
    let conn = state.lock()?;
    let member = registry(&conn, &state.config).find(id)?;
    Ok(Json(ApiResponse::ok(member)))
}

/// PUT /api/members/:id - Replace editable fields
async fn update_member(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<MemberInput>,
) -> ApiResult<Member> {
    let conn = state.lock()?;
    let member = registry(&conn, &state.config).update(id, &input, today())?;
    Ok(Json(ApiResponse::ok(member)))
}

/// DELETE /api/members/:id
async fn delete_member(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Member> {
    let conn = state.lock()?;
    let member = registry(&conn, &state.config).remove(id)?;
    Ok(Json(ApiResponse::ok(member)))
}

/// GET /api/members/:id/events - Audit trail
async fn get_member_events(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<Event>> {
    let conn = state.lock()?;
    let events = get_events_for_entity(&conn, "member", &id.to_string())?;
    Ok(Json(ApiResponse::ok(events)))
}

#[derive(Serialize)]
struct IdNumberResponse {
    id_number: String,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gender: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    citizenship: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// GET /api/id-numbers/:id_number - Decode an ID number
async fn check_id_number(Path(id_number): Path<String>) -> impl IntoResponse {
    let response = match IdentityNumber::parse(&id_number, today()) {
        Ok(id) => IdNumberResponse {
            id_number: id.to_string(),
            valid: true,
            date_of_birth: Some(id.birth_date()),
            gender: Some(id.gender().as_str()),
            citizenship: Some(id.citizenship().as_str()),
            reason: None,
        },
        Err(err) => IdNumberResponse {
            id_number,
            valid: false,
            date_of_birth: None,
            gender: None,
            citizenship: None,
            reason: Some(err.to_string()),
        },
    };

    Json(ApiResponse::ok(response))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/members", get(get_members).post(create_member))
        .route(
            "/members/:id",
            get(get_member).put(update_member).delete(delete_member),
        )
        .route("/members/:id/events", get(get_member_events))
        .route("/id-numbers/:id_number", get(check_id_number))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use anyhow::Context;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("member_registry=info,member_server=info")),
        )
        .init();

    let config = Config::from_env()?;

    let conn = Connection::open(&config.database_path).with_context(|| {
        format!("Failed to open database {}", config.database_path.display())
    })?;
    setup_database(&conn).context("Failed to set up database schema")?;
    tracing::info!(path = %config.database_path.display(), "database opened");

    let addr = config.bind_addr.clone();
    let app = router(AppState::new(conn, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(%addr, "server running, API at /api/members");

    axum::serve(listener, app)
        .await
        .context("Server stopped unexpectedly")
}
