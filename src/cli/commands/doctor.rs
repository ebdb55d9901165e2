//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::Settings;
use crate::provider::{detect_available_provider, EnvironmentKeys, Provider};
use console::style;
use std::path::Path;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks. Returns false when any check failed.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<bool> {
    Output::header("vidchat doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("External Tools").bold());
    let tool = check_tool(&settings.subtitles.ytdlp_path);
    tool.print();
    checks.push(tool);

    println!();

    println!("{}", style("AI Providers").bold());
    let provider_checks = check_providers(&EnvironmentKeys::from_env(), settings.chat.provider);
    for check in &provider_checks {
        check.print();
    }
    checks.extend(provider_checks);

    println!();

    println!("{}", style("Directories").bold());
    let dir_checks = vec![
        check_directory("Temp directory", &settings.temp_dir()),
        check_directory("Log directory", &settings.log_dir()),
        check_directory("Save directory", &settings.save_dir()),
    ];
    for check in &dir_checks {
        check.print();
    }
    checks.extend(dir_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file();
    config_check.print();
    checks.push(config_check);

    println!();

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using vidchat.",
            errors
        ));
        return Ok(false);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! vidchat is ready to use.");
    }

    Ok(true)
}

/// Check that yt-dlp runs.
fn check_tool(binary: &str) -> CheckResult {
    let hint = install_hint_ytdlp();
    match Command::new(binary).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();
            CheckResult::ok("yt-dlp", &version)
        }
        Ok(_) => CheckResult::error("yt-dlp", "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error("yt-dlp", &format!("{} not found", binary), hint)
        }
        Err(e) => CheckResult::error("yt-dlp", &format!("error: {}", e), hint),
    }
}

/// One line per provider plus which one a chat would use.
fn check_providers(env: &EnvironmentKeys, forced: Option<Provider>) -> Vec<CheckResult> {
    let mut results: Vec<CheckResult> = Provider::PRIORITY
        .iter()
        .map(|provider| match env.key_for(*provider) {
            Some(key) => CheckResult::ok(provider.env_var(), &format!("set ({})", mask_key(key))),
            None => CheckResult::ok(provider.env_var(), "not set"),
        })
        .collect();

    let selected = match forced {
        Some(p) if env.key_for(p).is_some() => Some(p),
        Some(p) => {
            results.push(CheckResult::error(
                "Provider",
                &format!("{} is configured but has no key", p.display_name()),
                &format!("Set with: export {}='...'", p.env_var()),
            ));
            return results;
        }
        None => detect_available_provider(env),
    };

    match selected {
        Some(p) => results.push(CheckResult::ok(
            "Provider",
            &format!("{} ({})", p.display_name(), p.default_model()),
        )),
        None => results.push(CheckResult::error(
            "Provider",
            "no API key found",
            "Set one of MISTRAL_API_KEY, GOOGLE_GENERATIVE_AI_API_KEY, ANTHROPIC_API_KEY, OPENAI_API_KEY",
        )),
    }

    results
}

fn check_directory(name: &str, path: &Path) -> CheckResult {
    if path.exists() {
        CheckResult::ok(name, &path.display().to_string())
    } else {
        CheckResult::warning(
            name,
            &format!("{} (will be created)", path.display()),
            "Directory will be created on first use",
        )
    }
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &config_path.display().to_string())
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            &format!("Create {} to customize", config_path.display()),
        )
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}
