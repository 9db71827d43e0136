use teambuilder_backend::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[rocket::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teambuilder_backend=info,rocket=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration; set DATABASE_URL and PRESENTER_PASSWORD_HASH or provide Config.toml");
            std::process::exit(1);
        }
    };

    tracing::info!(port = config.rocket_port, "starting team builder backend");

    if let Err(e) = teambuilder_backend::build(config).launch().await {
        tracing::error!(error = %e, "server terminated");
        std::process::exit(1);
    }
}
