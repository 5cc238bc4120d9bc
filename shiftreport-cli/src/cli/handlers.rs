//! CLI command handlers

use anyhow::{anyhow, Context, Result};
use shiftreport_core::models::{
    Configuration, InboundEvent, PointConfig, ReminderConfig, TOKEN_ENV,
};
use shiftreport_core::server::api::TriggerRequest;
use shiftreport_core::server::providers::{
    ChatTransport, TelegramTransport, TelegramUpdateSource, UpdateSource,
};
use shiftreport_core::server::{ShiftRuntime, ShiftServer};
use shiftreport_core::services::{FileRoster, Roster};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

/// Resolve `--config`, falling back to the XDG location
fn resolve_config_path(config_file: Option<PathBuf>) -> Result<PathBuf> {
    match config_file {
        Some(path) => Ok(path),
        None => Configuration::default_config_path()
            .map_err(|e| anyhow!("Failed to get default config path: {}", e)),
    }
}

fn load_config(path: &Path) -> Result<Configuration> {
    let mut config = Configuration::load_from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.apply_env_overrides();
    Ok(config)
}

fn bot_token() -> Result<String> {
    std::env::var(TOKEN_ENV)
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("{} is not set", TOKEN_ENV))
}

fn ensure_valid(config: &Configuration) -> Result<()> {
    if let Err(errors) = config.validate() {
        println!("❌ Configuration validation failed:");
        for error in &errors {
            println!("   - {}", error);
        }
        return Err(anyhow!("Configuration validation failed"));
    }
    Ok(())
}

/// Handle the 'serve' command
pub async fn handle_serve(config_file: Option<PathBuf>) -> Result<()> {
    let config_path = resolve_config_path(config_file)?;
    let config = load_config(&config_path)?;

    shiftreport_core::services::logging::init_logging(config.log_level.clone())
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;
    ensure_valid(&config)?;

    let token = bot_token()?;
    let api_base = config.telegram.api_base.clone();
    let transport: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(
        &api_base,
        token.clone(),
        config.telegram.max_media_group,
    ));
    let updates: Arc<dyn UpdateSource> = Arc::new(TelegramUpdateSource::new(&api_base, token));
    let roster: Arc<dyn Roster> = Arc::new(FileRoster::new(config.roster_path.clone()));

    tracing::info!(config = %config_path.display(), "Starting shiftreport");
    let runtime = Arc::new(ShiftRuntime::build(&config, transport, roster)?);
    ShiftServer::new(runtime, updates, &config).start().await
}

/// Handle the 'trigger' command
pub async fn handle_trigger(
    reminder: String,
    point: Option<String>,
    server: String,
    json: bool,
) -> Result<()> {
    let request = TriggerRequest { reminder, point };
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/v1/trigger", server.trim_end_matches('/')))
        .json(&request)
        .send()
        .await
        .with_context(|| format!("Failed to reach shiftreport server at {}", server))?;

    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    if !status.is_success() {
        let message = body
            .get("error")
            .and_then(|e| e.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());
        anyhow::bail!("Trigger failed ({}): {}", status, message);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        let count = |field: &str| body.get(field).and_then(|v| v.as_u64()).unwrap_or(0);
        println!("Reminder '{}' triggered:", request.reminder);
        println!("  Matched sessions: {}", count("matched"));
        println!("  Enqueued: {}", count("enqueued"));
        println!("  Already pending: {}", count("already_queued"));
        println!("  Expired shifts ended: {}", count("expired"));
    }
    Ok(())
}

/// Handle the 'chat-id' command
pub async fn handle_chat_id(config_file: Option<PathBuf>) -> Result<()> {
    let config = load_config(&resolve_config_path(config_file)?)?;
    let updates = TelegramUpdateSource::new(&config.telegram.api_base, bot_token()?);

    println!("📡 Waiting for messages. Write to the bot (or in a group it belongs to).");
    println!("   Press Ctrl+C to stop.");
    loop {
        tokio::select! {
            result = updates.next_events() => match result {
                Ok(events) => {
                    for event in &events {
                        println!("{}", describe_chat(event));
                    }
                }
                Err(e) => {
                    eprintln!("⚠️  Polling failed: {}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            },
            _ = signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn describe_chat(event: &InboundEvent) -> String {
    match event {
        InboundEvent::Content { chat, content } => {
            format!("chat_id: {}  (from {})", chat, content.sender.display_name)
        }
        other => format!("chat_id: {}", other.chat()),
    }
}

/// Handle 'config --check'
pub async fn handle_config_check(config_file: Option<PathBuf>) -> Result<()> {
    let config_path = resolve_config_path(config_file)?;
    println!("📄 Config file: {}", config_path.display());
    if !config_path.exists() {
        println!("⚠️  File not found, checking built-in defaults");
    }
    let config = load_config(&config_path)?;

    println!("\n🔍 Validating configuration...");
    ensure_valid(&config)?;
    println!("✅ Configuration is valid");

    println!("\n📋 Configuration summary:");
    println!("   Log level: {:?}", config.log_level);
    println!(
        "   Supervisory chat: {}",
        config
            .telegram
            .supervisory_chat_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "not set".to_string())
    );
    println!(
        "   Control API: {}:{}",
        config.server.host, config.server.port
    );
    println!("   Roster file: {}", config.roster_path.display());
    println!(
        "   Debounce: {} ms, shift expiry: {} h, pending cap: {}",
        config.timing.debounce_millis, config.timing.shift_expiry_hours, config.timing.pending_cap
    );
    println!("   Points ({}):", config.points.len());
    for point in &config.points {
        println!(
            "     - {} [{}] {}",
            point.name, point.point_type, point.timezone
        );
    }
    println!("   Reminders ({}):", config.reminders.len());
    for reminder in &config.reminders {
        println!(
            "     - {} \"{}\" {} ({})",
            reminder.key,
            reminder.name,
            reminder.cron,
            reminder.point_type.as_deref().unwrap_or("all points")
        );
    }
    if std::env::var(TOKEN_ENV).is_err() {
        println!("\n⚠️  {} is not set; 'serve' will refuse to start", TOKEN_ENV);
    }
    Ok(())
}

/// Handle 'config --init'
pub async fn handle_config_init(config_file: Option<PathBuf>) -> Result<()> {
    let config_path = resolve_config_path(config_file)?;
    println!("⚙️  Initializing shiftreport configuration");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📄 Config file: {}", config_path.display());

    if config_path.exists() {
        anyhow::bail!(
            "Configuration file already exists; remove it or pass a different --config"
        );
    }

    let config = sample_configuration();
    ensure_valid(&config)?;

    println!("\n💾 Saving configuration to {}...", config_path.display());
    config
        .save_to_file(&config_path)
        .map_err(|e| anyhow!("Failed to save configuration: {}", e))?;

    println!("✅ Configuration saved successfully!");
    println!("\n💡 Next steps:");
    println!("   1. Edit points, passwords and reminders in the file");
    println!("   2. export {}=<bot token>", TOKEN_ENV);
    println!("   3. Run 'shiftreport chat-id' to find the supervisory chat id");
    println!("   4. Run 'shiftreport config --check', then 'shiftreport serve'");
    Ok(())
}

fn sample_configuration() -> Configuration {
    let mut config = Configuration::default();
    config
        .timezones
        .insert("KZ".to_string(), "Asia/Almaty".to_string());
    config.points = vec![
        PointConfig {
            name: "Main St".to_string(),
            password: "change-me".to_string(),
            timezone: "KZ".to_string(),
            point_type: "store".to_string(),
        },
        PointConfig {
            name: "Warehouse".to_string(),
            password: "change-me-too".to_string(),
            timezone: "Europe/Moscow".to_string(),
            point_type: "warehouse".to_string(),
        },
    ];
    config.reminders = vec![
        ReminderConfig {
            key: "opening".to_string(),
            name: "Opening checklist".to_string(),
            cron: "0 9 * * *".to_string(),
            point_type: Some("store".to_string()),
        },
        ReminderConfig {
            key: "cash_count".to_string(),
            name: "Cash count".to_string(),
            cron: "0 13,18 * * *".to_string(),
            point_type: None,
        },
    ];
    config
}
