//! vidchat CLI entry point.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use vidchat::backend::ProviderBackendFactory;
use vidchat::chat::{MessageHandler, SessionOptions};
use vidchat::cli::{commands, preflight, Cli, Commands, Output};
use vidchat::config::{Prompts, Settings};
use vidchat::logging;
use vidchat::provider::EnvironmentKeys;
use vidchat::subtitle::YtdlpSubtitleSource;
use vidchat::tui::{self, AppInfo};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Logs go to a file so they never draw over the UI
    let level = logging::level_for(cli.verbose, &settings.general.log_level);
    let _log_guard = logging::init(&settings.log_dir(), &level)?;

    match &cli.command {
        Some(Commands::Doctor) => {
            if !commands::run_doctor(&settings)? {
                std::process::exit(1);
            }
            return Ok(());
        }
        Some(Commands::Config { action }) => {
            return commands::run_config(action, &settings, config_path.as_ref());
        }
        None => {}
    }

    let Some(url) = cli.url.clone() else {
        Output::error("No video URL given.");
        Output::info("Usage: vidchat <youtube-url>");
        std::process::exit(2);
    };

    std::fs::create_dir_all(settings.temp_dir())?;
    let source = Arc::new(YtdlpSubtitleSource::new(
        &settings.subtitles,
        settings.temp_dir(),
    ));

    let forced = cli.provider.or(settings.chat.provider);
    let model_override = cli.model.clone().or_else(|| settings.chat.model.clone());

    let spinner = Output::spinner("Checking requirements...");
    let checked = preflight::check(
        &url,
        source.as_ref(),
        &settings.subtitles.ytdlp_path,
        &EnvironmentKeys::from_env(),
        forced,
        model_override.as_deref(),
    )
    .await;
    spinner.finish_and_clear();

    let model = match checked {
        Ok(model) => model,
        Err(e) => {
            tracing::error!(error = %e, "Pre-flight check failed");
            Output::error(&e.to_string());
            if let Some(hint) = preflight::hint(&e) {
                Output::info(&hint);
            }
            std::process::exit(1);
        }
    };

    tracing::info!(
        url = %url,
        provider = %model.provider,
        model = %model.model_id,
        "Starting chat session"
    );

    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;

    let model_label = format!("{} · {}", model.provider.display_name(), model.model_id);
    let factory = Arc::new(
        ProviderBackendFactory::new(prompts, settings.request_timeout()).with_model(model),
    );

    let handler = MessageHandler::new()
        .with_exit_delay(settings.exit_delay())
        .with_save_dir(settings.save_dir());

    let options = SessionOptions {
        auto_transition: settings.chat.auto_transition && !cli.no_auto_transition,
    };

    tui::run(
        AppInfo { url, model_label },
        source,
        factory,
        handler,
        options,
    )
    .await
}
