//! Local stand-in for the Corpus API, seeded with demo users and documents.
//!
//! Run: cargo run --bin mock_backend
//! Then: corpus-cli --url http://127.0.0.1:8000/api/v1 login -u admin@corpus.com -p secret

use std::net::SocketAddr;

use corpus_client::dev_server::{corpus::Corpus, DevServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("CORPUS_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr: SocketAddr = std::env::var("MOCK_BIND")
        .unwrap_or_else(|_| "127.0.0.1:8000".to_string())
        .parse()?;
    let server = DevServer::bind(addr, Corpus::demo()).await?;

    info!(url = %server.base_url(), "mock corpus backend listening");
    info!("demo users: admin@corpus.com / secret (admin), analyst@corpus.com / analyst");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
        _ = server.wait() => {}
    }
    Ok(())
}
