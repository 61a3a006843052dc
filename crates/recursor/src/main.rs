//! `recursord`: a recursive DNS resolver on UDP port 53. Takes no
//! arguments; tune logging with `RUST_LOG`.

use burrow_dns_core::{listen_and_serve, Network};
use burrow_dns_recursor::{AnswerCache, RecursorHandler, Resolver};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cache = Arc::new(AnswerCache::new());
    let resolver = Arc::new(Resolver::new(cache));
    let handler = Arc::new(RecursorHandler::new(resolver));

    info!("starting recursor");
    listen_and_serve(Network::Udp, "0.0.0.0:53", handler).await?;
    Ok(())
}
