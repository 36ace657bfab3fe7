use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod repository;

pub mod routes;
use auth::{AuthUser, Identity, MaybeUser};
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use auth::TokenVerifier;
pub use config::AppConfig;
pub use memory::InMemoryRepository;
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every handler and schema, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_posts, handlers::create_post, handlers::update_post,
        handlers::delete_post, handlers::get_users, handlers::get_tags,
        handlers::get_posts_by_tag
    ),
    components(
        schemas(
            models::User, models::Author, models::Tag, models::Post, models::TagsInput,
            models::CreatePostRequest, models::UpdatePostRequest, models::PostsResponse,
            models::PostResponse, models::UsersResponse, models::TagsResponse,
            error::ErrorBody,
        )
    ),
    tags(
        (name = "blog-api", description = "Users, posts and tags with bearer-token auth")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container shared by every request: the store handle, the token
/// verifier built from the configured secret, and the configuration itself.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub verifier: TokenVerifier,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the state, deriving the verifier from `config`.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            repo,
            verifier: TokenVerifier::from_config(&config),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for TokenVerifier {
    fn from_ref(app_state: &AppState) -> TokenVerifier {
        app_state.verifier.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// soft_auth_middleware
///
/// Runs in front of every API route. Anonymous requests pass through; a malformed
/// header or an invalid token is rejected here by the `MaybeUser` extractor. The
/// resolved identity is stored as an `Identity` extension for the handlers.
async fn soft_auth_middleware(
    MaybeUser(user): MaybeUser,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(user) = &user {
        tracing::debug!(user_id = user.id, username = %user.username, "user is set");
    }
    request.extensions_mut().insert(Identity(user));
    next.run(request).await
}

/// auth_middleware
///
/// Hard gate for `authenticated_routes`: extracting `AuthUser` rejects the request with
/// 401 before the handler runs when no existing user can be resolved.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies the auth gates and the observability layers,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // Every API route goes through the soft gate; writes also through the hard gate.
    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            soft_auth_middleware,
        ));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(|| async { "ok" }))
        .merge(api)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, uri and the `x-request-id` assigned by
/// `SetRequestIdLayer`, so every log line of one request is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
