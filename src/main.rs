mod auth;
mod card;
mod codes;
mod config;
mod layout;
mod pdf;
mod preview;
mod routes;
mod state;
mod templates;

use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ausweis=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    let state = Arc::new(state::AppState::new(config));
    let app = routes::app(state);

    tracing::info!("ausweis listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
