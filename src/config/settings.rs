use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use tokbar_core::MonitorSettings;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Live token budget meter for an LLM conversation")]
pub struct Config {
    /// Enable debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Conversation transcript to monitor
    pub transcript: Option<PathBuf>,

    /// Refresh interval in milliseconds
    #[arg(short = 'i', long)]
    pub interval: Option<u64>,

    /// Initial token limit
    #[arg(short = 't', long)]
    pub token_limit: Option<u64>,

    /// Fold bursts of changes into a single refresh
    #[arg(long)]
    pub coalesce: bool,

    /// Print one line per update instead of the full-screen view
    #[arg(long, global = true)]
    pub plain: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Estimate the tokens of a file (or stdin) once and exit
    Estimate {
        /// File to read; stdin when omitted
        file: Option<PathBuf>,

        /// Model label to resolve the limit for
        #[arg(short, long)]
        model: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a scripted conversation (no transcript required)
    Demo,
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Application settings (from config file)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Monitor settings live at the top level of the file
    #[serde(flatten)]
    pub monitor: MonitorSettings,

    /// UI settings
    #[serde(default)]
    pub ui: UiSettings,
}

/// UI-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiSettings {
    /// Enable color output
    #[serde(default = "default_color")]
    pub color: bool,

    /// Show the prompt/response token split under the bar
    #[serde(default = "default_show_breakdown")]
    pub show_breakdown: bool,
}

fn default_color() -> bool {
    true
}

fn default_show_breakdown() -> bool {
    true
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            color: default_color(),
            show_breakdown: default_show_breakdown(),
        }
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // Try custom path first
        if let Some(p) = path {
            if p.exists() {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {:?}", p))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", p));
            }
        }

        // Try default config locations
        let default_paths = [
            dirs::config_dir().map(|p| p.join("tokbar/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/tokbar/config.toml")),
            dirs::home_dir().map(|p| p.join(".tokbar.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", path));
            }
        }

        // Return defaults if no config file found
        Ok(Self::default())
    }

    /// Merge CLI config into settings (CLI takes precedence)
    pub fn merge_cli(&mut self, cli: &Config) {
        if let Some(interval) = cli.interval {
            self.monitor.update_interval_ms = interval;
        }
        if let Some(token_limit) = cli.token_limit {
            self.monitor.token_limit = token_limit;
        }
        if cli.coalesce {
            self.monitor.coalesce_mutations = true;
        }
    }

    /// Validate and normalize settings values
    pub fn validate(&mut self) {
        self.monitor.validate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.monitor.token_limit, 8192);
        assert_eq!(settings.monitor.update_interval_ms, 5000);
        assert!(settings.ui.color);
        assert!(settings.ui.show_breakdown);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            token_limit = 4096
            update_interval_ms = 1000
            response_content_selector = "^Assistant:"

            [[limit_rules]]
            match = "o1"
            limit = 32000

            [ui]
            color = false
        "#;

        let settings: Settings = toml::from_str(toml).expect("Should parse TOML");
        assert_eq!(settings.monitor.token_limit, 4096);
        assert_eq!(settings.monitor.update_interval_ms, 1000);
        assert_eq!(settings.monitor.response_content_selector, "^Assistant:");
        assert_eq!(settings.monitor.limit_rules.len(), 1);
        assert!(!settings.ui.color);
        assert!(settings.ui.show_breakdown);
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "token_limit = 1234\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.monitor.token_limit, 1234);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "token_limit = \"lots\"\n").unwrap();

        assert!(Settings::load(Some(&path)).is_err());
    }

    #[test]
    fn test_cli_takes_precedence() {
        let cli = Config::parse_from(["tokbar", "chat.md", "-i", "250", "-t", "64000", "--coalesce"]);
        let mut settings = Settings::default();
        settings.merge_cli(&cli);
        settings.validate();

        assert_eq!(cli.transcript, Some(PathBuf::from("chat.md")));
        assert_eq!(settings.monitor.update_interval_ms, 250);
        assert_eq!(settings.monitor.token_limit, 64000);
        assert!(settings.monitor.coalesce_mutations);
    }

    #[test]
    fn test_zero_limit_is_normalized() {
        let cli = Config::parse_from(["tokbar", "chat.md", "-t", "0"]);
        let mut settings = Settings::default();
        settings.merge_cli(&cli);
        settings.validate();
        assert_eq!(settings.monitor.token_limit, 8192);
    }

    #[test]
    fn test_subcommands() {
        let cli = Config::parse_from(["tokbar", "estimate", "notes.txt", "--model", "o1", "--json"]);
        match cli.command {
            Some(Command::Estimate { file, model, json }) => {
                assert_eq!(file, Some(PathBuf::from("notes.txt")));
                assert_eq!(model.as_deref(), Some("o1"));
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(matches!(
            Config::parse_from(["tokbar", "demo", "--plain"]),
            Config {
                command: Some(Command::Demo),
                plain: true,
                ..
            }
        ));
    }
}
