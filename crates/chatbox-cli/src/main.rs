use anyhow::Result;
use chatbox_core::ai::DEFAULT_ENDPOINT;
use chatbox_core::{
    Conversation, FileStorage, GlobalConfig, HttpCompletionsClient, MemoryStorage, Storage,
};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

mod repl;

pub type Session = Conversation<Box<dyn Storage>, HttpCompletionsClient>;

#[derive(Parser)]
#[command(name = "chatbox", version)]
#[command(about = "Chat with a completions endpoint from the terminal")]
struct Cli {
    /// Completions endpoint URL
    #[arg(long, global = true, env = "CHATBOX_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
    /// Directory holding saved settings and conversation
    #[arg(long, global = true, env = "CHATBOX_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Keep everything in memory for this run
    #[arg(long, global = true)]
    ephemeral: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Send one message and print the reply
    Send {
        /// Message text
        text: String,
    },
    /// Print the current conversation
    History,
    /// Clear the conversation
    Clear,
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current settings
    Show,
    /// Change one or more settings
    Set {
        /// API key forwarded to the endpoint
        #[arg(long)]
        key: Option<String>,
        /// Model identifier
        #[arg(long)]
        model: Option<String>,
        /// Save the conversation between sessions (true/false)
        #[arg(long)]
        persist: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let location = storage_location(&cli);
    let storage = open_storage(&cli)?;
    let client = HttpCompletionsClient::new(&cli.endpoint);
    let mut conversation: Session = Conversation::restore(storage, client);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => repl::run(&mut conversation).await?,
        Commands::Send { text } => match repl::submission_text(&text) {
            Some(text) => {
                let reply = conversation.submit(text).await?;
                repl::print_message(&reply);
            }
            None => println!("{}", "Nothing to send".yellow()),
        },
        Commands::History => repl::print_history(&conversation),
        Commands::Clear => {
            conversation.clear()?;
            println!("{}", "Conversation cleared".green());
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => show_config(&location, &conversation),
            ConfigAction::Set { key, model, persist } => {
                let mut config = conversation.config().clone();
                if let Some(key) = key {
                    config.api_key = key;
                }
                if let Some(model) = model {
                    config.model = model;
                }
                if let Some(persist) = persist {
                    config.persist = persist;
                }
                conversation.set_config(config);
                show_config(&location, &conversation);
            }
        },
    }

    Ok(())
}

fn open_storage(cli: &Cli) -> Result<Box<dyn Storage>> {
    if cli.ephemeral {
        return Ok(Box::new(MemoryStorage::new()));
    }

    let storage = match &cli.data_dir {
        Some(dir) => FileStorage::new(dir),
        None => FileStorage::in_config_dir()?,
    };
    log::debug!("Using data directory {:?}", storage.dir());
    Ok(Box::new(storage))
}

/// Where settings live, for display
fn storage_location(cli: &Cli) -> String {
    if cli.ephemeral {
        return "memory (--ephemeral)".to_string();
    }
    match &cli.data_dir {
        Some(dir) => dir.display().to_string(),
        None => FileStorage::default_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|_| "unknown".to_string()),
    }
}

fn show_config(location: &str, conversation: &Session) {
    let config: &GlobalConfig = conversation.config();

    println!("\n{}", "⚙️  Settings".bold().blue());
    println!("{}", "=".repeat(30).dimmed());
    println!("  Endpoint: {}", conversation.client().endpoint().cyan());
    println!("  Storage:  {}", location.dimmed());
    if config.api_key.is_empty() {
        println!("  API key:  {}", "not set".yellow());
    } else {
        println!("  API key:  {}", config.masked_api_key());
    }
    println!("  Model:    {}", config.model.magenta());
    println!("  Persist:  {}", if config.persist { "on".green() } else { "off".dimmed() });
}
