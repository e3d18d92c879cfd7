use assistive_vqa::config::{Args, Config};
use assistive_vqa::server;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from(args);

    tracing::info!(
        "Starting assistive-vqa-server v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!(
        "Binding to {}:{} (preset {}, scales {:?})",
        config.host,
        config.port,
        config.preset.as_str(),
        config.scales
    );
    if config.vision_endpoint.is_none() {
        tracing::warn!("No vision endpoint configured; questions will be answered from text only");
    }

    server::run(config).await
}
