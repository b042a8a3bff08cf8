//! Logging system demonstration
//!
//! Shows the output formats and how request URLs are redacted before they
//! reach any log line.
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run --example logging_demo
//!
//! # JSON format
//! cargo run --example logging_demo -- json
//!
//! # With custom filter
//! cargo run --example logging_demo -- pretty "core_runtime=trace"
//! ```

use bridge_traits::time::LogLevel;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_runtime::logging::{init_logging, redact_url_credentials, LogFormat, LoggingConfig};
use std::env;
use tracing::{debug, info, instrument, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_pii_redaction(true)
        .with_target(true);

    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    if let Err(e) = init_logging(config) {
        eprintln!("Failed to initialize logging: {}", e);
        return;
    }

    info!(format = ?format, "Logging initialized");

    let url = "https://music.example.com/rest/getIndexes.view?c=demo&f=json&v=1.10.1&u=admin&p=hunter2";
    debug!(url = %redact_url_credentials(url), "Request URL after redaction");

    let bus = EventBus::new(8);
    let mut rx = bus.subscribe();
    simulate_run(&bus);

    while let Ok(event) = rx.try_recv() {
        info!(severity = ?event.severity(), "{}", event.description());
    }
}

#[instrument(skip(bus))]
fn simulate_run(bus: &EventBus) {
    let run_id = "demo-run".to_string();

    bus.emit(CoreEvent::Sync(SyncEvent::Started {
        run_id: run_id.clone(),
        server: "music.example.com".to_string(),
    }))
    .ok();

    warn!(id = "al-404", "Directory fetch failed");

    bus.emit(CoreEvent::Sync(SyncEvent::Completed {
        run_id,
        songs_committed: 120,
        songs_skipped: 3,
        fetch_failures: 1,
        duration_secs: 4,
    }))
    .ok();
}
