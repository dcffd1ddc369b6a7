//! tokbar: live token budget meter for an ongoing LLM conversation.
//!
//! The estimation and refresh pipeline lives in `tokbar-core`; this crate
//! adds the CLI, the terminal views, and the one-shot and demo modes.

pub mod config;
pub mod demo;
pub mod estimate;
pub mod plain;
pub mod ui;
