#[cfg(feature = "telemetry")]
use std::sync::OnceLock;

#[cfg(feature = "telemetry")]
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize tracing subscriber once per process.
///
/// Output goes to stderr so diagnostics on stdout stay machine-readable.
#[cfg(feature = "telemetry")]
pub fn init_tracing() {
    static INIT: OnceLock<()> = OnceLock::new();

    INIT.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ctxflow=info"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

#[cfg(not(feature = "telemetry"))]
pub fn init_tracing() {}

/// Run an inline block inside an `info_span!` tagged with the analysis phase.
#[macro_export]
macro_rules! instrument_block {
    ($name:expr, $block:block) => {{
        let span = tracing::info_span!("ctxflow", phase = $name);
        let _guard = span.enter();
        (|| $block)()
    }};
}
