pub mod coach;
pub mod error;
pub mod job;
pub mod models;
pub mod series;
pub mod session;
pub mod settings;
pub mod stream;
pub mod urls;
mod utils;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use coach::{CoachConfig, CoachScheduler, HuggingFaceGenerator};
use session::{EventSink, SessionController};
use settings::SettingsStore;
use urls::UrlResolver;

/// Initialises logging once per process (reads `RUST_LOG`).
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

/// Wires a controller from persisted settings. `api_base` overrides the
/// stored and environment-provided backend address.
pub fn build_controller(
    settings: &SettingsStore,
    api_base: Option<String>,
    sink: Arc<dyn EventSink>,
) -> SessionController {
    let api_base = api_base.unwrap_or_else(|| settings.api_base());
    let config = CoachConfig::default();
    let generator = HuggingFaceGenerator::new(settings.coach_model_url(), &config);
    let credential = settings.coach_credential();
    if credential.is_none() {
        log::info!("No note-generation credential set; coaching notes disabled");
    }

    log::info!("Using backend at {}", api_base);
    let scheduler = CoachScheduler::new(config, Arc::new(generator), credential);
    SessionController::new(UrlResolver::new(api_base), scheduler, sink)
}
