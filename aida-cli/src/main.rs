//! CLI entry point for the AIDA chat widget

use aida_bridge::HttpBridge;
use aida_core::bridge::{RemoteBridge, DEFAULT_API_SERVER_URL};
use aida_core::config::{Config, ConfigLoader};
use aida_core::conversation::{Message, Role};
use aida_core::logging::init_logging;
use aida_core::render;
use aida_core::storage::{FileStore, KeyValueStore};
use aida_core::utils::{expand_tilde, id_preview, truncate};
use aida_core::widget::{ChatWidget, Notice, NoticeLevel, Notifier};
use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, Input, Password};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "aida")]
#[command(about = "Chat with the AIDA ERP assistant from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,

    /// Site origin the identity is derived from
    #[arg(long, global = true)]
    origin: Option<String>,

    /// Signed-in user the identity is derived from
    #[arg(short, long, global = true)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file
    Init {
        /// Overwrite an existing configuration without asking
        #[arg(short, long)]
        force: bool,
    },
    /// Send a message, or start an interactive chat without --message
    Chat {
        /// Message to send
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Open a backend session
    Connect,
    /// Release the current session
    Disconnect {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Clear the conversation history
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the conversation history
    History {
        /// Include error entries
        #[arg(short, long)]
        all: bool,
        /// Print the rendered HTML transcript
        #[arg(long)]
        html: bool,
    },
    /// Save ERP credentials for this user
    Login {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Check that the AIDA API server is reachable
    TestConnection {
        /// Server to probe instead of the configured one
        #[arg(long)]
        url: Option<String>,
    },
    /// Show status information
    Status,
}

impl Commands {
    fn assume_yes(&self) -> bool {
        match self {
            Commands::Disconnect { yes } | Commands::Clear { yes } => *yes,
            _ => false,
        }
    }
}

/// Prints notices to the terminal and asks confirmations on stdin
struct ConsoleNotifier {
    assume_yes: bool,
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => println!("{}", style(notice.text).cyan()),
            NoticeLevel::Success => println!("{}", style(notice.text).green()),
            NoticeLevel::Warning => println!("{}", style(notice.text).yellow()),
            NoticeLevel::Error => eprintln!("{}", style(notice.text).red()),
        }
    }

    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or_else(|e| {
                warn!("Confirmation prompt failed: {}", e);
                false
            })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = if let Some(dir) = &cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    let config = match config_loader.load() {
        Ok(config) => config,
        Err(e) if matches!(cli.command, Commands::Init { force: true }) => {
            eprintln!(
                "{} {}",
                style("Ignoring unreadable configuration:").yellow(),
                e
            );
            Config::default()
        }
        Err(e) => return Err(e.into()),
    };
    let _guard = init_logging(&config.logging);

    let origin = cli
        .origin
        .clone()
        .unwrap_or_else(|| config.site.origin.clone());
    let username = cli
        .user
        .clone()
        .unwrap_or_else(|| config.site.username.clone());
    let assume_yes = cli.command.assume_yes();

    match cli.command {
        Commands::Init { force } => {
            info!("Running init command");
            run_init(&config_loader, force)?;
        }
        Commands::Chat { message } => {
            let widget = build_widget(&config, &origin, &username, assume_yes).await;
            match message {
                Some(msg) => {
                    info!("Sending single message");
                    run_chat_once(&widget, &msg).await;
                }
                None => {
                    info!("Starting interactive chat");
                    run_chat_interactive(&widget).await?;
                }
            }
        }
        Commands::Connect => {
            info!("Connecting session");
            let widget = build_widget(&config, &origin, &username, assume_yes).await;
            widget.connect().await?;
        }
        Commands::Disconnect { .. } => {
            info!("Disconnecting session");
            let widget = build_widget(&config, &origin, &username, assume_yes).await;
            widget.disconnect();
        }
        Commands::Clear { .. } => {
            info!("Clearing conversation history");
            let widget = build_widget(&config, &origin, &username, assume_yes).await;
            if !widget.clear_history() {
                println!("Clear cancelled.");
            }
        }
        Commands::History { all, html } => {
            info!("Showing history");
            let widget = build_widget(&config, &origin, &username, assume_yes).await;
            run_history(&widget, all, html);
        }
        Commands::Login { username: login, password } => {
            info!("Saving credentials");
            let widget = build_widget(&config, &origin, &username, assume_yes).await;
            run_login(&widget, login, password)?;
        }
        Commands::TestConnection { url } => {
            info!("Testing connection");
            let widget = build_widget(&config, &origin, &username, assume_yes).await;
            run_test_connection(&widget, url.as_deref()).await;
        }
        Commands::Status => {
            info!("Showing status");
            let widget = build_widget(&config, &origin, &username, assume_yes).await;
            run_status(&config_loader, &config, &widget);
        }
    }

    Ok(())
}

/// Wire the widget to the HTTP bridge and the on-disk store
async fn build_widget(
    config: &Config,
    origin: &str,
    username: &str,
    assume_yes: bool,
) -> ChatWidget {
    let bridge: Arc<dyn RemoteBridge> = Arc::new(HttpBridge::from_config(config));
    let storage: Arc<dyn KeyValueStore> =
        Arc::new(FileStore::new(expand_tilde(&config.storage.dir)));
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier { assume_yes });

    let widget = ChatWidget::start(bridge, storage, notifier, origin, username).await;

    // A saved password wins over the one from config or AIDA_PASSWORD
    if widget.settings().password.is_empty() && !config.site.password.is_empty() {
        widget.use_password(&config.site.password);
    }
    widget
}

/// Write a configuration file from a few prompts
fn run_init(loader: &ConfigLoader, force: bool) -> Result<()> {
    println!("{}", style("Welcome to AIDA!").bold().cyan());

    let config_path = loader.config_path();
    if config_path.exists() && !force {
        let overwrite = Confirm::new()
            .with_prompt("Configuration already exists. Overwrite?")
            .default(false)
            .interact()?;
        if !overwrite {
            println!("Init cancelled.");
            return Ok(());
        }
    }

    let mut config = Config::default();
    config.backend.api_server_url = Input::new()
        .with_prompt("AIDA API server URL")
        .default(DEFAULT_API_SERVER_URL.to_string())
        .interact_text()?;
    config.site.origin = Input::new()
        .with_prompt("ERP site URL")
        .default(config.site.origin.clone())
        .interact_text()?;
    config.site.username = Input::new()
        .with_prompt("ERP username")
        .default(config.site.username.clone())
        .interact_text()?;

    loader.save(&config)?;
    println!(
        "\n{} {}",
        style("Configuration written to").green(),
        config_path.display()
    );
    println!("Run `aida login` to store your password.");
    Ok(())
}

fn print_entry(message: &Message) {
    let time = style(render::format_time(&message.timestamp)).dim();
    match message.role {
        Role::User => println!("{} {} {}", time, style("You:").bold().green(), message.text),
        Role::Assistant => println!("{} {} {}", time, style("AIDA:").bold().cyan(), message.text),
        Role::Error => println!(
            "{} {} {}",
            time,
            style("Error:").bold().red(),
            style(&message.text).red()
        ),
    }
}

async fn run_chat_once(widget: &ChatWidget, text: &str) {
    if !widget.widget_settings().enabled {
        println!("{}", style("The AIDA widget is disabled.").yellow());
        return;
    }
    match widget.send_message(text).await {
        Some(entry) => print_entry(&entry),
        None => println!("Nothing to send."),
    }
}

async fn run_chat_interactive(widget: &ChatWidget) -> Result<()> {
    if !widget.widget_settings().enabled {
        println!("{}", style("The AIDA widget is disabled.").yellow());
        return Ok(());
    }

    println!("{}", style("AIDA Assistant").bold().cyan());
    let history = widget.history();
    if history.is_empty() {
        println!("{} {}", style("AIDA:").bold().cyan(), widget.welcome_message());
    } else {
        history.replayable().for_each(print_entry);
    }
    println!("{}\n", style("Type 'exit' to quit.").dim());

    loop {
        let input: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        let input = input.trim();
        if matches!(input, "exit" | "quit") {
            break;
        }
        if let Some(entry) = widget.send_message(input).await {
            print_entry(&entry);
        }
    }
    Ok(())
}

fn run_history(widget: &ChatWidget, all: bool, html: bool) {
    if html {
        println!("{}", widget.replay());
        return;
    }

    let history = widget.history();
    if history.is_empty() {
        println!("No conversation history.");
        return;
    }
    history
        .messages()
        .iter()
        .filter(|m| all || m.is_replayable())
        .for_each(print_entry);
}

fn run_login(widget: &ChatWidget, username: Option<String>, password: Option<String>) -> Result<()> {
    let username = match username {
        Some(username) => username,
        None => Input::new()
            .with_prompt("ERP username")
            .default(widget.settings().username)
            .interact_text()?,
    };
    let password = match password {
        Some(password) => password,
        None => Password::new().with_prompt("ERP password").interact()?,
    };
    widget.save_credentials(&username, &password)?;
    Ok(())
}

async fn run_test_connection(widget: &ChatWidget, url: Option<&str>) {
    let report = widget.test_connection(url).await;
    if let Some(status) = &report.server_status {
        println!("  Server status: {}", status);
    }
    if let Some(time) = &report.server_time {
        println!("  Server time: {}", time);
    }
}

fn run_status(loader: &ConfigLoader, config: &Config, widget: &ChatWidget) {
    println!("{}", style("AIDA Status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    println!("  Config file: {}", loader.config_path().display());
    println!("  API server: {}", config.backend.api_server_url);
    println!("  Storage: {}", expand_tilde(&config.storage.dir).display());
    let enabled = if widget.widget_settings().enabled {
        style("enabled").green()
    } else {
        style("disabled").dim()
    };
    println!("  Widget: {}", enabled);
    println!();

    let settings = widget.settings();
    println!("{}", style("User:").bold());
    println!("  Site: {}", settings.site_url);
    println!("  Identity: {}", widget.identity());
    let credentials = if settings.credentials().is_complete() {
        style("configured").green()
    } else {
        style("not configured").red()
    };
    println!("  Credentials: {}", credentials);
    println!();

    println!("{}", style("Conversation:").bold());
    match widget.known_session() {
        Some(id) => println!("  Session: {}", id_preview(id.as_str(), 8)),
        None => println!("  Session: {}", style("none").dim()),
    }
    let history = widget.history();
    println!("  Messages: {}", history.len());
    if let Some(last) = history.last() {
        println!("  Last: {}", truncate(&last.text, 60));
    }
}
