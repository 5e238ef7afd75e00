use env_logger::{Builder, Env, WriteStyle};
use log::{error, info, warn};
use std::fs::OpenOptions;

use crate::modules::config::Settings;

/// Initialize the logging system, writing to the configured log file or stderr.
///
/// `RUST_LOG` overrides the level from settings.
pub fn initialize_logging(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = Builder::from_env(Env::default().default_filter_or(settings.log_level.as_str()));
    builder
        .format_timestamp_secs()
        .format_module_path(true)
        .write_style(WriteStyle::Auto);

    if let Some(path) = &settings.log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;

    info!("Logging system initialized");
    Ok(())
}

/// Helper function to format sensitive data for logging
pub fn format_sensitive(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}

/// Structured log line for a provider store mutation
pub fn log_provider_event(operation: &str, provider: &str, success: bool, details: Option<&str>) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    if success {
        info!(
            "Provider event: op={}, provider={}, success=true, timestamp={}, details={:?}",
            operation, provider, timestamp, details
        );
    } else {
        error!(
            "Provider event: op={}, provider={}, success=false, timestamp={}, details={:?}",
            operation, provider, timestamp, details
        );
    }
}

/// Structured log line for one delivery attempt against a provider
pub fn log_delivery_attempt(provider: &str, username: &str, success: bool, details: Option<&str>) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    if success {
        info!(
            "Delivery attempt: provider={}, user={}, success=true, timestamp={}, details={:?}",
            provider,
            format_sensitive(username),
            timestamp,
            details
        );
    } else {
        warn!(
            "Delivery attempt: provider={}, user={}, success=false, timestamp={}, details={:?}",
            provider,
            format_sensitive(username),
            timestamp,
            details
        );
    }
}
