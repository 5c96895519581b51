use anyhow::Result;

mod api;
mod app;
mod channel;
mod config;
mod error;
mod filtering;
mod middleware;
mod services;
mod state;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    app::run().await
}
