pub mod api;
pub mod config;
pub mod services;

use crate::config::AppConfig;
use crate::services::invoker::ToolInvoker;
use crate::services::staging::StagingStore;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::convert::word2pdf,
        api::handlers::convert::merge,
        api::handlers::convert::split,
        api::handlers::convert::compress,
        api::handlers::convert::pdf2jpg,
        api::handlers::convert::jpg2pdf,
        api::handlers::convert::protect,
        api::handlers::convert::unlock,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "system", description = "Service status"),
        (name = "convert", description = "Document conversion endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub staging: Arc<StagingStore>,
    pub invoker: Arc<ToolInvoker>,
    pub config: AppConfig,
}

impl AppState {
    /// Wire the staging store and tool invoker from configuration. The
    /// storage directory is created here; nothing else touches global state.
    pub async fn from_config(config: AppConfig) -> std::io::Result<Self> {
        let staging = Arc::new(StagingStore::new(&config.storage_dir).await?);
        let invoker = Arc::new(ToolInvoker::new(Duration::from_secs(
            config.tool_timeout_secs,
        )));
        Ok(Self {
            staging,
            invoker,
            config,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/api/word2pdf", post(api::handlers::convert::word2pdf))
        .route("/api/merge", post(api::handlers::convert::merge))
        .route("/api/split", post(api::handlers::convert::split))
        .route("/api/compress", post(api::handlers::convert::compress))
        .route("/api/pdf2jpg", post(api::handlers::convert::pdf2jpg))
        .route("/api/jpg2pdf", post(api::handlers::convert::jpg2pdf))
        .route("/api/protect", post(api::handlers::convert::protect))
        .route("/api/unlock", post(api::handlers::convert::unlock))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
