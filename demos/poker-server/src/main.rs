use std::sync::Arc;
use std::time::Duration;

use planpoker::prelude::*;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Process settings, read from `PLANPOKER_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    bind: String,
    sweep_interval: Duration,
    keep_alive: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            sweep_interval: SweepConfig::default().interval,
            keep_alive: PlanPokerServerBuilder::DEFAULT_KEEP_ALIVE,
        }
    }
}

impl Settings {
    fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparsable values fall back to the defaults.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str, fallback: Duration| match lookup(key) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    tracing::warn!(key, value = %raw, "not a number of seconds, using default");
                    fallback
                }
            },
            None => fallback,
        };

        Self {
            bind: lookup("PLANPOKER_BIND").unwrap_or(defaults.bind),
            sweep_interval: secs("PLANPOKER_SWEEP_SECS", defaults.sweep_interval),
            keep_alive: secs("PLANPOKER_KEEPALIVE_SECS", defaults.keep_alive),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let settings = Settings::from_env();
    tracing::info!(?settings, "starting planpoker server");

    let server = PlanPokerServer::builder()
        .bind(&settings.bind)
        .keep_alive_interval(settings.keep_alive)
        .build()
        .await?;

    let sweeper = spawn_sweeper(
        Arc::clone(server.service().registry()),
        SweepConfig {
            interval: settings.sweep_interval,
            ..SweepConfig::default()
        },
    );

    let result = server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    let removed = sweeper.shutdown().await;
    tracing::info!(removed, "server shutdown complete");

    result.map_err(Into::into)
}
