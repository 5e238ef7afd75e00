// First, declare the modules folder itself
mod modules;

// Re-export everything from modules for easier access
pub use modules::{config, email, encryption, error, providers, utils};

// Re-export commonly used types
pub use modules::config::Settings;
pub use modules::email::{CallContext, FailoverDispatcher, SendRequest, SmtpMailTransport};
pub use modules::encryption::MasterKey;
pub use modules::error::ErrorKind;
pub use modules::providers::CredentialStore;

// Constants
pub const DEFAULT_CONFIG_FILE: &str = "config/quickmail.json";
pub const DEFAULT_PROVIDERS_FILE: &str = "data/providers.json";
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

// Environment variables
pub const CONFIG_FILE_ENV: &str = "QUICKMAIL_CONFIG_FILE";
pub const SECRET_ENV: &str = "MAIL_CONFIG_SECRET";
pub const PROVIDERS_FILE_ENV: &str = "QUICKMAIL_PROVIDERS_FILE";
