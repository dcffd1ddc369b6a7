mod settings;

pub use settings::{MonitorSettings, DEFAULT_TOKEN_LIMIT, DEFAULT_UPDATE_INTERVAL_MS};
