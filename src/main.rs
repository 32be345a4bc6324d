mod config;
mod error;
mod events;
mod note;
mod preview;
mod render;
mod server;
mod store;
mod tools;
mod webdriver;

use anyhow::Result;
use config::{Config, LoggingConfig};
use events::ReportEvents;
use preview::PreviewNotifier;
use render::ReportRenderer;
use server::McpServer;
use std::sync::Arc;
use store::NoteStore;
use tools::{register_sticky_note_tools, NoteBoard, ToolRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;

    // Initialize logging (stderr only; stdout carries JSON-RPC)
    init_logging(&config.logging);
    log::info!("Starting {} v{}...", config.server.name, config.server.version);
    log::info!("Configuration loaded ({})", config_path);

    // Ensure output directories exist
    config.ensure_directories()?;

    let store = NoteStore::open(
        &config.notes.data_file,
        ReportRenderer::new(&config.notes.html_file),
    );
    log::info!(
        "Note store ready: {} notes in {} (next id {})",
        store.notes().len(),
        store.data_file().display(),
        store.next_id()
    );

    // Browser preview subscribes to report updates
    let mut events = ReportEvents::new();
    let preview = if config.preview.enabled {
        let notifier = Arc::new(PreviewNotifier::new(&config.preview));
        events.subscribe(notifier.clone());
        Some(notifier)
    } else {
        None
    };
    if events.is_empty() {
        log::info!("Browser preview disabled");
    }

    let mut registry = ToolRegistry::new();
    register_sticky_note_tools(&mut registry, Arc::new(NoteBoard::new(store, events)));

    let server = McpServer::new(
        config.server.name.clone(),
        config.server.version.clone(),
        registry,
    );
    let result = server.run_stdio().await;

    if let Some(notifier) = preview {
        notifier.close().await;
    }

    log::info!("Server stopped");
    result
}

fn init_logging(config: &LoggingConfig) {
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| config.level.clone());
    let mut builder = pretty_env_logger::formatted_builder();
    builder.parse_filters(&filters);
    if let Err(e) = builder.try_init() {
        eprintln!("Logger already initialized: {}", e);
    }
}
