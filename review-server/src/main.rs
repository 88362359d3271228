use review_server::{app, config};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before reading RUST_LOG so the filter can come from it too.
    let env_file = config::load_env_file();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "review_server=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_file {
        Some(path) => info!(path = %path.display(), "Loaded environment from .env"),
        None => info!("No .env file found; using process environment only"),
    }

    let config = config::Config::from_env()?;
    info!(port = config.port, "review server starting");

    let state = app::build_state(&config).await?;
    let router = app::build_router(state, &config)?;

    let addr = config.listen_addr();
    info!("listening on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
