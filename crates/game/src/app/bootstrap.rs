use skool_engine::LoopConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::config::{load_loop_config, ConfigError};

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
}

/// Installs logging first so configuration errors are reported through it.
pub(crate) fn build_app() -> Result<AppWiring, ConfigError> {
    init_tracing();
    info!("=== Skool Startup ===");

    let config = load_loop_config(|key| std::env::var(key).ok())?;
    info!(
        ticks = config.ticks,
        target_tps = config.target_tps,
        seed = config.seed,
        enabled_mods = ?config.content_request.enabled_mods,
        "run_config_loaded"
    );

    Ok(AppWiring { config })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
