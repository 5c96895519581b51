use anyhow::Result;
use axum::Router;

use crate::{api, config::Config, middleware, state::AppState};

pub async fn run() -> Result<()> {
    let config = Config::from_env()?;
    let addr = config.addr;
    let state = AppState::new(&config).await?;

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    let router = api::routes::router(state);
    middleware::http::apply(router)
}
