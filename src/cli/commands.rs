use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sicha")]
#[command(author, version, about = "Conversation-state core for an LLM chat client", long_about = None)]
pub struct Cli {
    /// Directory holding the persisted conversation, settings and
    /// assistant state
    #[arg(long, default_value = "./data", global = true)]
    pub data_dir: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a single prompt without touching the conversation history
    Chat {
        prompt: String,

        #[arg(short = 's', long)]
        system: Option<String>,

        /// Print tokens as they arrive
        #[arg(long)]
        stream: bool,
    },

    /// Start an interactive chat session over the persisted stores
    Interactive,

    /// Inspect or change the persisted settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Manage the persisted conversation list
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print the current settings record
    Show,

    /// Merge the given fields into the settings record and persist it
    Set {
        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// Model identifier, e.g. gpt-4o or gpt-4o-mini
        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        system_prompt: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List conversations, most recent first
    List,

    /// Delete a conversation by id
    Delete { id: String },
}
