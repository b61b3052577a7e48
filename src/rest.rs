//! REST API layer using Axum.
//!
//! Routes are declared in [`ROUTES`], one entry per (method, path) pair, each
//! mapped to one of a closed set of endpoints. Protected endpoints sit behind
//! `auth_middleware`, which accepts `Authorization: <token>` or
//! `Authorization: Bearer <token>` and stores the verified claims in request
//! extensions.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, Request, State},
    http::{header, HeaderName, HeaderValue},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, on, MethodFilter, MethodRouter},
    BoxError, Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::{CredentialVerifier, TokenService};
use crate::error::AppError;
use crate::models::{Claims, IssuedToken, Recipe, RecipeInput, RefreshRequest, SignInRequest};
use crate::recipes::RecipeService;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Shared app state for REST handlers (Arc-wrapped for concurrency)
pub struct AppState {
    pub recipes: RecipeService,
    pub credentials: CredentialVerifier,
    pub tokens: TokenService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    List,
    Get,
    Create,
    Update,
    Delete,
    SignIn,
    Refresh,
}

impl Endpoint {
    pub fn requires_auth(self) -> bool {
        matches!(
            self,
            Endpoint::Get | Endpoint::Create | Endpoint::Update | Endpoint::Delete
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub method: MethodFilter,
    pub path: &'static str,
    pub endpoint: Endpoint,
}

pub const ROUTES: [Route; 7] = [
    Route { method: MethodFilter::POST, path: "/signin", endpoint: Endpoint::SignIn },
    Route { method: MethodFilter::POST, path: "/refresh", endpoint: Endpoint::Refresh },
    Route { method: MethodFilter::GET, path: "/recipes", endpoint: Endpoint::List },
    Route { method: MethodFilter::POST, path: "/recipes", endpoint: Endpoint::Create },
    Route { method: MethodFilter::GET, path: "/recipes/:id", endpoint: Endpoint::Get },
    Route { method: MethodFilter::PUT, path: "/recipes/:id", endpoint: Endpoint::Update },
    Route { method: MethodFilter::DELETE, path: "/recipes/:id", endpoint: Endpoint::Delete },
];

impl Route {
    fn method_router(&self, state: &Arc<AppState>) -> MethodRouter<Arc<AppState>> {
        let router = match self.endpoint {
            Endpoint::List => on(self.method, list_recipes_handler),
            Endpoint::Get => on(self.method, get_recipe_handler),
            Endpoint::Create => on(self.method, create_recipe_handler),
            Endpoint::Update => on(self.method, update_recipe_handler),
            Endpoint::Delete => on(self.method, delete_recipe_handler),
            Endpoint::SignIn => on(self.method, sign_in_handler),
            Endpoint::Refresh => on(self.method, refresh_handler),
        };
        if self.endpoint.requires_auth() {
            router.route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        } else {
            router
        }
    }
}

/// Create the Axum router. Requests running longer than `request_timeout`
/// are dropped and answered with 408.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let state = Arc::new(state);

    let mut router = Router::new().route("/", get(health_handler));
    for route in &ROUTES {
        router = router.route(route.path, route.method_router(&state));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .timeout(request_timeout),
        )
        .with_state(state)
}

async fn handle_timeout_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Timeout
    } else {
        AppError::Internal(err.to_string())
    }
}

/// Tags every request with a fresh id: a tracing span field and an
/// `X-Request-Id` response header.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut response = next.run(req).instrument(span.clone()).await;
    span.in_scope(|| tracing::info!(status = response.status().as_u16(), "request completed"));

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = auth_header.strip_prefix("Bearer ").unwrap_or(auth_header).trim();
    let claims = state.tokens.verify(token).map_err(|rejection| {
        tracing::debug!(reason = %rejection, "token rejected");
        AppError::Unauthorized
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

fn parse_recipe_id(raw: &str) -> Result<String, AppError> {
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| AppError::Validation(format!("invalid recipe id `{raw}`")))
}

/// Health check handler
async fn health_handler() -> Json<Value> {
    Json(json!({ "data": "Server is up and running" }))
}

async fn sign_in_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<Json<IssuedToken>, AppError> {
    let Json(payload) = payload?;
    let username = state
        .credentials
        .verify(&payload.username, &payload.password)
        .await?;
    let issued = state.tokens.issue(&username)?;
    tracing::info!(username = %username, expires_at = %issued.expires_at, "token issued");
    Ok(Json(issued))
}

async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<IssuedToken>, AppError> {
    let Json(payload) = payload?;
    let issued = state.tokens.refresh(&payload.token).map_err(|err| {
        tracing::debug!(error = %err, "token refresh refused");
        AppError::from(err)
    })?;
    Ok(Json(issued))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub tag: Option<String>,
}

async fn list_recipes_handler(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Recipe>>, AppError> {
    let Query(params) = params?;
    let recipes = match params.tag.as_deref() {
        Some(tag) => state.recipes.list_tagged(tag).await?,
        None => state.recipes.list().await?,
    };
    Ok(Json(recipes))
}

async fn get_recipe_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Recipe>, AppError> {
    let id = parse_recipe_id(&id)?;
    Ok(Json(state.recipes.get(&id).await?))
}

async fn create_recipe_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<RecipeInput>, JsonRejection>,
) -> Result<Json<Recipe>, AppError> {
    let Json(input) = payload?;
    let recipe = state.recipes.create(input).await?;
    tracing::debug!(recipe_id = %recipe.id, user = %claims.sub, "create handled");
    Ok(Json(recipe))
}

async fn update_recipe_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    payload: Result<Json<RecipeInput>, JsonRejection>,
) -> Result<Json<Recipe>, AppError> {
    let id = parse_recipe_id(&id)?;
    let Json(input) = payload?;
    let recipe = state.recipes.update(&id, input).await?;
    tracing::debug!(recipe_id = %id, user = %claims.sub, "update handled");
    Ok(Json(recipe))
}

async fn delete_recipe_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_recipe_id(&id)?;
    state.recipes.delete(&id).await?;
    tracing::debug!(recipe_id = %id, user = %claims.sub, "delete handled");
    Ok(Json(json!({ "message": "Recipe has been deleted" })))
}
