use std::sync::OnceLock;

use tracing::{Subscriber, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _};

static TELEMETRY_INIT: OnceLock<()> = OnceLock::new();

/// Transport crates that log every request at debug
const QUIET_TARGETS: [&str; 3] = ["hyper_util", "alloy_rpc_client", "alloy_transport_http"];

/// Filters with `RUST_LOG`, falling back to `default_level` when it is unset.
pub fn get_subscriber(default_level: LevelFilter) -> impl Subscriber + Send + Sync {
    let mut filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    for target in QUIET_TARGETS {
        filter = filter.add_directive(
            format!("{target}=warn")
                .parse()
                .expect("well-formed tracing directive should parse"),
        );
    }

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::Registry::default()
        .with(filter)
        .with(fmt_layer)
}

pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) {
    TELEMETRY_INIT
        .set(())
        .expect("global tracing subscriber already set");
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}
