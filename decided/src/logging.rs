use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// sqlx logs every statement at info
fn default_directives(level: &str) -> String {
    format!("{},sqlx=warn", level)
}

/// `RUST_LOG`, when set, overrides `DECIDE_LOG`
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives(level).into());

    let layer = if json {
        fmt::layer().json().with_current_span(true).boxed()
    } else {
        fmt::layer().boxed()
    };

    tracing_subscriber::registry().with(filter).with(layer).init();
}
