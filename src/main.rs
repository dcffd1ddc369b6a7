use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tokbar::config::{Command, Config, Settings};
use tokbar::ui::App;
use tokbar::{demo, estimate, plain};
use tokbar_core::source::TranscriptSource;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse_args();

    // The full-screen view owns the terminal, so its logs go to a file
    let full_screen = !cli.plain && !matches!(cli.command, Some(Command::Estimate { .. }));
    setup_logging(cli.debug, full_screen.then(log_file_path));

    // Load settings
    let mut settings = Settings::load(cli.config.as_ref())?;
    settings.merge_cli(&cli);
    settings.validate();

    match &cli.command {
        Some(Command::Estimate { file, model, json }) => {
            estimate::run(&settings, file.as_deref(), model.as_deref(), *json)
        }
        Some(Command::Demo) => demo::run(settings, cli.plain).await,
        None => {
            let Some(path) = cli.transcript.clone() else {
                anyhow::bail!("no transcript given (try `tokbar <FILE>` or `tokbar demo`)");
            };
            let source = TranscriptSource::new(&path, &settings.monitor)
                .with_context(|| format!("Cannot monitor {:?}", path))?;
            let title = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            if cli.plain {
                plain::run(&settings, source, async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await
            } else {
                App::new(settings, title).run(source).await
            }
        }
    }
}

fn log_file_path() -> PathBuf {
    std::env::temp_dir().join("tokbar").join("tokbar.log")
}

fn setup_logging(debug: bool, log_file: Option<PathBuf>) {
    let filter = if debug {
        EnvFilter::new("tokbar=debug,tokbar_core=debug")
    } else {
        EnvFilter::new("tokbar=info,tokbar_core=info")
    };

    let file = log_file.and_then(|path| {
        std::fs::create_dir_all(path.parent()?).ok()?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match file {
        Some(file) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init(),
        None => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
