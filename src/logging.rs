use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "imageprompt=info,tower_http=info";

/// Installs the global subscriber: `RUST_LOG` filter, human-readable stdout.
pub fn init_tracing() {
    let env_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(env_layer)
        .with(stdout_layer)
        .init();
}
