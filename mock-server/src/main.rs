use std::str::FromStr;

use tokio::net::TcpListener;
use tracing::info;

fn init_tracing() {
    let env = std::env::var("INSIGHT_MOCK_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    init_tracing();
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, username = insight_mock::DEFAULT_USERNAME, "mock Insight listening");
    insight_mock::run(listener).await
}
