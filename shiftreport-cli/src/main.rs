mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::handlers;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shiftreport")]
#[command(version)]
#[command(about = "Shift report coordinator for field staff")]
#[command(
    help_template = "{name} - {version}\n{about}\n\n{usage-heading}\n  {usage}\n\n{all-args}{options}\n"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot: poll updates, schedule reminders and serve the control API
    ///
    /// The bot token is read from SHIFTREPORT_TELEGRAM_BOT_TOKEN.
    /// SHIFTREPORT_SUPERVISORY_CHAT_ID overrides the configured supervisory chat.
    Serve {
        /// Path to configuration file (default: ~/.config/shiftreport/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Force a reminder into verified sessions through a running server
    ///
    /// Examples:
    ///   shiftreport trigger cash_count --all
    ///   shiftreport trigger opening_photos --point "Main St"
    Trigger {
        /// Reminder key as configured
        reminder: String,

        /// Target every verified session
        #[arg(long, conflicts_with = "point")]
        all: bool,

        /// Target sessions at this point only
        #[arg(long, required_unless_present = "all")]
        point: Option<String>,

        /// Control API URL of the running server
        #[arg(long, default_value = "http://127.0.0.1:8787")]
        server: String,

        /// Output the raw JSON report
        #[arg(long)]
        json: bool,
    },

    /// Print the chat id of whoever writes to the bot
    ///
    /// Use it to find the supervisory chat id: add the bot to the group,
    /// post any message there and copy the printed id into the configuration.
    ChatId {
        /// Path to configuration file (default: ~/.config/shiftreport/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Inspect or create the configuration file
    Config {
        /// Load, validate and summarize the configuration
        #[arg(long, conflicts_with = "init")]
        check: bool,

        /// Write a sample configuration (does not overwrite an existing file)
        #[arg(long)]
        init: bool,

        /// Path to configuration file (default: ~/.config/shiftreport/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            handlers::handle_serve(config).await?;
        }
        Commands::Trigger {
            reminder,
            all: _,
            point,
            server,
            json,
        } => {
            handlers::handle_trigger(reminder, point, server, json).await?;
        }
        Commands::ChatId { config } => {
            handlers::handle_chat_id(config).await?;
        }
        Commands::Config {
            check,
            init,
            config,
        } => {
            if init {
                handlers::handle_config_init(config).await?;
            } else if check {
                handlers::handle_config_check(config).await?;
            } else {
                println!("Config command requires --check or --init");
                println!("Usage: shiftreport config (--check | --init) [--config PATH]");
            }
        }
    }

    Ok(())
}
