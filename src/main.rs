use std::env;
use std::path::PathBuf;

use proforma::gate::{EmailNotifier, Gate, JsonFileStore, NotifyConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let raw_args: Vec<String> = env::args().collect();
    if raw_args.get(1).map(|s| s.as_str()) == Some("serve") {
        let port = raw_args
            .get(2)
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);

        let store_path = env::var("PROFORMA_STORE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("proforma_store.json"));

        let notifier = NotifyConfig::from_env().map(EmailNotifier::new);
        if notifier.is_none() {
            tracing::warn!(
                "EmailJS identifiers not configured; access notifications are disabled"
            );
        }

        let gate = match Gate::open(Box::new(JsonFileStore::new(store_path)), notifier) {
            Ok(gate) => gate,
            Err(e) => {
                eprintln!("Failed to open unlock store: {e}");
                std::process::exit(1);
            }
        };

        if let Err(e) = proforma::api::run_http_server(port, gate).await {
            eprintln!("Server error: {e}");
            std::process::exit(1);
        }
        return;
    }

    eprintln!("Usage: cargo run -- serve [port]");
    std::process::exit(1);
}
