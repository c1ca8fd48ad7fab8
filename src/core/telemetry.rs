use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::core::config::Settings;

/// Installs the global subscriber. RUST_LOG wins when set; otherwise the
/// configured level applies with the chattiest dependencies capped.
pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let telemetry = settings.telemetry();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},sqlx=warn,tower_http=info", telemetry.log_level))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE);

    let installed = if telemetry.json { builder.json().try_init() } else { builder.try_init() };
    installed.map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}
