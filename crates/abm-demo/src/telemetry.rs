//! Tracing subscriber setup for the demo binary.

use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` selects levels; `ABM_LOG_FORMAT=json` switches to one JSON
/// object per event. Logs go to stderr so stdout stays machine-readable.
pub fn init_telemetry() -> Result<()> {
    let json = std::env::var("ABM_LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,abm_engine=info,abm_demo=debug".into());

    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| fmt::layer().with_target(true).with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))?;

    info!(json, "Telemetry initialized");
    Ok(())
}
