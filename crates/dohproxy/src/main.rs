//! `dohproxy`: serve `/dns-query` over HTTP and forward each query to the
//! configured upstream resolver, optionally over TLS.

use burrow_dns_dohproxy::{router, Config, Upstream};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dohproxy")]
#[command(about = "DNS-over-HTTPS proxy forwarding to a configured resolver")]
struct Args {
    /// Configuration file path
    #[arg(default_value = "./dohproxy.conf")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_file(&args.config)?;

    let upstream = Upstream {
        addr: config.forward.clone(),
        use_tls: config.use_tls,
    };
    let app = router(upstream);

    let listen = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!(listen = %listen, forward = %config.forward, tls = config.use_tls, "serving DoH");
    axum::serve(listener, app).await?;

    Ok(())
}
