use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use sauce_boss_api::{load_content, RecipeListing, SauceBossApi, API_CONTRACT_VERSION};
use sauce_boss_core::{RequestEnvelope, ResponseEnvelope};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use ulid::Ulid;

const SERVICE_CONTRACT_VERSION: &str = "service.v1";
const DEFAULT_LOG_FILTER: &str = "sauce_boss=info";

#[derive(Debug, Clone)]
struct ServiceState {
    api: SauceBossApi,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    service_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    service_contract_version: &'static str,
    error: String,
}

#[derive(Debug, Clone, Deserialize)]
struct MigrateRequest {
    dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct LocalesResponse {
    default_language: String,
    locales: Vec<String>,
}

#[derive(Debug, Parser)]
#[command(name = "sauce-boss-service")]
#[command(about = "HTTP endpoint for the Sauce Boss voice skill")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:4020")]
    bind: SocketAddr,
    /// Directory with strings.json and recipes.json replacing the embedded content.
    #[arg(long)]
    content_dir: Option<PathBuf>,
    #[arg(long, default_value = "en")]
    default_language: String,
    /// Keep session state in this SQLite file instead of the response envelope.
    #[arg(long)]
    session_db: Option<PathBuf>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = StatusCode::BAD_REQUEST;
        (status, Json(self)).into_response()
    }
}

impl ServiceState {
    fn error(message: impl Into<String>) -> ServiceError {
        ServiceError { service_contract_version: SERVICE_CONTRACT_VERSION, error: message.into() }
    }
}

fn envelope<T>(data: T) -> ServiceEnvelope<T>
where
    T: Serialize,
{
    ServiceEnvelope {
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    }
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/skill", post(skill))
        .route("/v1/recipes/:locale", get(recipes))
        .route("/v1/locales", get(locales))
        .route("/v1/db/schema-version", post(db_schema_version))
        .route("/v1/db/migrate", post(db_migrate))
        .with_state(state)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let content = load_content(args.content_dir.as_deref(), &args.default_language)?;
    let mut api = SauceBossApi::new(content);
    if let Some(db_path) = args.session_db {
        api = api.with_session_db(db_path);
        api.migrate(false)?;
    }

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(bind = %args.bind, "sauce boss service listening");
    axum::serve(listener, app(ServiceState { api })).await?;
    Ok(())
}

async fn health() -> Json<ServiceEnvelope<HealthResponse>> {
    Json(envelope(HealthResponse { status: "ok" }))
}

async fn skill(
    State(state): State<ServiceState>,
    Json(request): Json<RequestEnvelope>,
) -> Json<ResponseEnvelope> {
    let request_id = Ulid::new();
    let span = tracing::info_span!("skill_request", %request_id);
    Json(span.in_scope(|| state.api.handle(&request)))
}

async fn recipes(
    State(state): State<ServiceState>,
    Path(locale): Path<String>,
) -> Json<ServiceEnvelope<RecipeListing>> {
    Json(envelope(state.api.recipes(&locale)))
}

async fn locales(State(state): State<ServiceState>) -> Json<ServiceEnvelope<LocalesResponse>> {
    Json(envelope(LocalesResponse {
        default_language: state.api.content().default_language().to_string(),
        locales: state.api.locales(),
    }))
}

async fn db_schema_version(
    State(state): State<ServiceState>,
) -> Result<Json<ServiceEnvelope<sauce_boss_store_sqlite::SchemaStatus>>, ServiceError> {
    let status = state.api.schema_status().map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(status)))
}

async fn db_migrate(
    State(state): State<ServiceState>,
    Json(request): Json<MigrateRequest>,
) -> Result<Json<ServiceEnvelope<sauce_boss_api::MigrateResult>>, ServiceError> {
    let result =
        state.api.migrate(request.dry_run).map_err(|err| ServiceState::error(err.to_string()))?;
    Ok(Json(envelope(result)))
}
