pub mod config;
pub mod manager;


pub use config::{BackendConfig, LaunchConfig, Settings};
pub use manager::SettingsManager;
