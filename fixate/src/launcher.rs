use tracing_subscriber::{
    fmt::{format, time},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Environment bootstrap: load `.env` and seed a default `RUST_LOG`.
pub fn fixate_start(_name: &str) {
    dotenv::dotenv().ok();

    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var(
            "RUST_LOG",
            "fixate=info,fixate_tracking=info,fixate_types=info,warn",
        );
    }
}

/// Install the global tracing subscriber: compact format with process
/// uptime timestamps, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let evt_fmt = format().with_timer(time::uptime()).compact();
    let fmt_layer = tracing_subscriber::fmt::layer().event_format(evt_fmt);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(EnvFilter::from_default_env())
        .init();
}
