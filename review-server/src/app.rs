use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{self, ApiState};
use crate::config::Config;
use crate::converter::CommandConverter;
use crate::notifier;
use crate::reviewers::JsonReviewerDirectory;
use crate::store::DocumentStore;
use crate::workflow::ReviewWorkflow;

/// Open the store, load reviewer assignments and wire the real collaborators.
pub async fn build_state(config: &Config) -> anyhow::Result<ApiState> {
    let store = DocumentStore::open(&config.upload_root).await?;
    tracing::info!(root = %store.root().display(), "Document store ready");

    let reviewers = JsonReviewerDirectory::load(&config.reviewer_file).await?;
    let notifier = notifier::from_config(&config.smtp)?;
    let converter = CommandConverter::new(&config.converter_program, config.converter_timeout);

    let workflow = ReviewWorkflow::new(
        store,
        Arc::new(reviewers),
        notifier,
        Arc::new(converter),
    );
    Ok(ApiState {
        workflow: Arc::new(workflow),
    })
}

fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let allow_origin = if config.cors_allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins = config
            .cors_allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {origin}: {e}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600)))
}

/// Full application: routes plus CORS, request tracing and the upload limit.
pub fn build_router(state: ApiState, config: &Config) -> anyhow::Result<Router> {
    Ok(api::router()
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(config)?)
        .layer(TraceLayer::new_for_http()))
}
