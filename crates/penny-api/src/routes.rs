use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use penny_core::models::{Category, Expense};
use penny_core::sync::ModifiedBatch;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{extract_bearer_token, AuthenticatedUser, JwtVerifier};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::store::ServerStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    jwt_verifier: Arc<JwtVerifier>,
    store: Arc<ServerStore>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<ServerStore>) -> Self {
        Self {
            jwt_verifier: Arc::new(JwtVerifier::new(&config)),
            store,
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/sync/categories/modified", get(modified_categories))
        .route("/sync/categories/batch", post(upload_categories))
        .route("/sync/categories/count", get(count_categories))
        .route("/sync/expenses/modified", get(modified_expenses))
        .route("/sync/expenses/batch", post(upload_expenses))
        .route("/sync/expenses/count", get(count_expenses))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let user = state.jwt_verifier.verify_access_token(token)?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
struct ModifiedParams {
    page: u32,
    since: DateTime<Utc>,
}

fn validate_page(page: u32) -> Result<u32, AppError> {
    if page == 0 {
        return Err(AppError::bad_request("page numbers start at 1"));
    }
    Ok(page)
}

async fn modified_categories(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<ModifiedParams>,
) -> Result<Json<ModifiedBatch<Category>>, AppError> {
    let page = validate_page(params.page)?;
    let batch = state
        .store
        .modified_categories(&user.user_id, page, params.since)
        .await?;
    Ok(Json(batch))
}

async fn modified_expenses(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<ModifiedParams>,
) -> Result<Json<ModifiedBatch<Expense>>, AppError> {
    let page = validate_page(params.page)?;
    let batch = state
        .store
        .modified_expenses(&user.user_id, page, params.since)
        .await?;
    Ok(Json(batch))
}

async fn upload_categories(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(records): Json<Vec<Category>>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .upload_categories(&user.user_id, &records)
        .await?;

    tracing::debug!(
        user = %user.user_id,
        records = records.len(),
        "applied category batch"
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_expenses(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(records): Json<Vec<Expense>>,
) -> Result<StatusCode, AppError> {
    for record in &records {
        if !record.amount.is_finite() || record.amount < 0.0 {
            return Err(AppError::bad_request("expense amounts must be non-negative"));
        }
    }

    state.store.upload_expenses(&user.user_id, &records).await?;

    tracing::debug!(
        user = %user.user_id,
        records = records.len(),
        "applied expense batch"
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct CountResponse {
    count: u64,
}

async fn count_categories(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<CountResponse>, AppError> {
    let count = state.store.count_categories(&user.user_id).await?;
    Ok(Json(CountResponse { count }))
}

async fn count_expenses(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<CountResponse>, AppError> {
    let count = state.store.count_expenses(&user.user_id).await?;
    Ok(Json(CountResponse { count }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_start_at_one() {
        assert!(validate_page(0).is_err());
        assert_eq!(validate_page(1).unwrap(), 1);
        assert_eq!(validate_page(3).unwrap(), 3);
    }
}
