use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,sqlx=warn,sea_orm=warn";

/// JSON lines by default; `ARENA_LOG_FORMAT=pretty` for local runs.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let pretty = std::env::var("ARENA_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("pretty"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if pretty {
        registry.with(fmt::layer().with_target(true)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_target(false)
                    .with_ansi(false),
            )
            .init();
    }
}
