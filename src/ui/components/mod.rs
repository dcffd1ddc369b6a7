mod status_bar;
mod usage_bar;

pub use status_bar::StatusBar;
pub use usage_bar::{UsageBar, UsageBarProps};
