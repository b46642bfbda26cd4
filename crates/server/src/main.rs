use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit, Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use server_api::{
    article_store_route, article_views_route, create_article_from_json, dashboard_route,
    draft_articles_route, increment_views, list_drafts, list_published,
    published_articles_route, register_user, show_dashboard, ApiContext,
};
use shared::{
    domain::{ArticleId, UserId},
    error::{ApiError, ErrorCode},
    protocol::{ArticleCreated, DashboardView, ViewsUpdated},
};
use storage::{normalize_database_url, Storage};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use crate::config::load_settings;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

type HttpError = (StatusCode, Json<ApiError>);

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LoginResponse {
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    /// Missing, unparsable or non-positive pages read as 1; pages beyond
    /// `u32` read as the last representable one.
    fn page(&self) -> u32 {
        match self.page.as_deref().map(|raw| raw.trim().parse::<i64>()) {
            Some(Ok(page)) if page > 1 => u32::try_from(page).unwrap_or(u32::MAX),
            _ => 1,
        }
    }
}

fn requested_page(query: Result<Query<PageQuery>, QueryRejection>) -> u32 {
    query.map(|Query(q)| q.page()).unwrap_or(1)
}

#[derive(Debug, Deserialize)]
struct ActingUserQuery {
    user_id: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .init();

    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext::new(storage),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/login", post(login))
        .route(dashboard_route(), get(http_show_dashboard))
        .route(article_store_route(), post(http_create_article))
        .route(published_articles_route(), get(http_list_published))
        .route(draft_articles_route(), get(http_list_drafts))
        .route(article_views_route(), post(http_increment_views))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn http_error(err: ApiError) -> HttpError {
    (status_for(err.code), Json(err))
}

/// Unreadable bodies keep axum's status but use the regular error body.
fn rejected_body(rejection: JsonRejection) -> HttpError {
    (
        rejection.status(),
        Json(ApiError::new(ErrorCode::Validation, rejection.body_text())),
    )
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state.api.storage.health_check().await.map_err(|e| {
        error!(error = %e, "health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn login(
    State(state): State<Arc<AppState>>,
    req: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, HttpError> {
    let Json(req) = req.map_err(rejected_body)?;
    let user_id = register_user(&state.api, &req.username)
        .await
        .map_err(http_error)?;
    Ok(Json(LoginResponse { user_id: user_id.0 }))
}

async fn http_show_dashboard(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<DashboardView>, HttpError> {
    let view = show_dashboard(&state.api, requested_page(query))
        .await
        .map_err(http_error)?;
    Ok(Json(view))
}

async fn http_list_published(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<DashboardView>, HttpError> {
    let view = list_published(&state.api, requested_page(query))
        .await
        .map_err(http_error)?;
    Ok(Json(view))
}

async fn http_list_drafts(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<DashboardView>, HttpError> {
    let view = list_drafts(&state.api, requested_page(query))
        .await
        .map_err(http_error)?;
    Ok(Json(view))
}

async fn http_create_article(
    State(state): State<Arc<AppState>>,
    acting: Result<Query<ActingUserQuery>, QueryRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ArticleCreated>), HttpError> {
    let Query(acting) = acting.map_err(|rejection| {
        http_error(ApiError::new(
            ErrorCode::Unauthorized,
            format!("a numeric user_id is required: {}", rejection.body_text()),
        ))
    })?;
    let Json(body) = body.map_err(rejected_body)?;
    let created = create_article_from_json(&state.api, UserId(acting.user_id), &body)
        .await
        .map_err(http_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn http_increment_views(
    State(state): State<Arc<AppState>>,
    article_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ViewsUpdated>, HttpError> {
    let Path(article_id) = article_id.map_err(|rejection| {
        http_error(ApiError::new(ErrorCode::NotFound, rejection.body_text()))
    })?;
    let updated = increment_views(&state.api, ArticleId(article_id))
        .await
        .map_err(http_error)?;
    Ok(Json(updated))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
