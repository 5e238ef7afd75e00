// Declare all modules
pub mod config;
pub mod email;
pub mod encryption;
pub mod error;
pub mod providers;
pub mod utils;

// No re-exports here as they're handled in lib.rs
