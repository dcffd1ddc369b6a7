//! Usage limits: which token budget applies to the active model.

pub mod detector;
pub mod rules;

pub use detector::{LimitChange, LimitDetector};
pub use rules::{default_limit_rules, LimitRule, LimitTable};
