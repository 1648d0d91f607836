use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use sicha::cli::{Cli, Commands, HistoryCommands, SettingsCommands};
use sicha::storage::filesystem::FileSystemStorage;
use sicha::{
    utils, ChatApp, CompletionClient, CompletionRequest, Model, NewAssistant, OpenAiClient,
    SettingsPatch,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Stand-in client for subcommands that never reach the network, so a
/// missing API key does not block them.
struct OfflineCompletion;

#[async_trait]
impl CompletionClient for OfflineCompletion {
    async fn complete(&self, _request: CompletionRequest) -> Result<String> {
        anyhow::bail!("no completion endpoint configured")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let storage = Arc::new(FileSystemStorage::new(PathBuf::from(&cli.data_dir)).await?);

    match cli.command {
        Commands::Chat {
            prompt,
            system,
            stream,
        } => {
            let client = Arc::new(OpenAiClient::from_env()?);
            let app = ChatApp::init(storage, client.clone()).await?;
            handle_chat(&app, &client, prompt, system, stream).await
        }
        Commands::Interactive => {
            let client = Arc::new(OpenAiClient::from_env()?);
            let app = ChatApp::init(storage, client).await?;
            handle_interactive(&app).await
        }
        Commands::Settings { command } => {
            let app = ChatApp::init(storage, Arc::new(OfflineCompletion)).await?;
            handle_settings(&app, command).await
        }
        Commands::History { command } => {
            let app = ChatApp::init(storage, Arc::new(OfflineCompletion)).await?;
            handle_history(&app, command).await
        }
    }
}

async fn handle_chat(
    app: &ChatApp,
    client: &OpenAiClient,
    prompt: String,
    system: Option<String>,
    stream: bool,
) -> Result<()> {
    let mut settings = app.settings.snapshot().await;
    if let Some(system) = system {
        settings.system_prompt = system;
    }

    let history = vec![sicha::Message::user(prompt)];
    let request = CompletionRequest::from_history(&settings, &history);

    if stream {
        let (tx, mut rx) = mpsc::channel(32);
        let printer = tokio::spawn(async move {
            use std::io::Write;
            while let Some(token) = rx.recv().await {
                print!("{}", token);
                std::io::stdout().flush().ok();
            }
            println!();
        });

        client.stream(request, tx).await?;
        printer.await?;
    } else {
        let response = client.complete(request).await?;
        println!("\n{}", response);
    }

    Ok(())
}

const REPL_HELP: &str = "\
/new                start a new conversation
/list               list conversations
/switch <id>        switch to a conversation
/delete <id>        delete a conversation
/assistants         list assistant profiles
/create <name>      create an assistant profile from the current settings
/use <id>           select a profile and feed it into the settings
/settings           show current settings
/help               show this help
/quit               exit";

async fn handle_interactive(app: &ChatApp) -> Result<()> {
    utils::print_header("Sicha");
    println!("Type a message, or /help for commands\n");

    if let Some(conversation) = app.conversations.current_conversation().await {
        utils::print_success(&format!(
            "Resumed '{}' ({} messages)",
            conversation.title,
            conversation.messages.len()
        ));
    }

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        utils::print_prompt("You: ");
        let mut input = String::new();
        if reader.read_line(&mut input).await? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix('/') {
            if !handle_repl_command(app, command).await? {
                break;
            }
            continue;
        }

        match app.conversations.send_message(input).await {
            Ok(Some(reply)) => utils::print_assistant(&reply.content),
            Ok(None) => {}
            Err(e) => utils::print_error(&format!("Send failed: {}", e)),
        }
    }

    Ok(())
}

/// Returns false when the session should end.
async fn handle_repl_command(app: &ChatApp, command: &str) -> Result<bool> {
    let (name, arg) = match command.split_once(' ') {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "quit" | "exit" => return Ok(false),
        "help" => println!("{}", REPL_HELP),
        "new" => {
            let id = app.conversations.create_new().await;
            utils::print_success(&format!("Started conversation {}", id));
        }
        "list" => {
            for conversation in app.conversations.conversations().await {
                println!(
                    "{}  {}  ({} messages)",
                    conversation.id,
                    conversation.title,
                    conversation.messages.len()
                );
            }
        }
        "switch" => match app.conversations.select(arg).await {
            Ok(()) => utils::print_success(&format!("Switched to {}", arg)),
            Err(e) => utils::print_error(&e.to_string()),
        },
        "delete" => match app.conversations.delete(arg).await {
            Ok(()) => utils::print_success("Deleted"),
            Err(e) => utils::print_error(&e.to_string()),
        },
        "assistants" => {
            let current = app.assistants.current().await;
            for profile in app.assistants.assistants().await {
                let marker = if profile.id == current.id { "*" } else { " " };
                println!("{} {}  {}  [{}]", marker, profile.id, profile.name, profile.model);
            }
        }
        "create" if !arg.is_empty() => {
            let settings = app.settings.snapshot().await;
            let profile = app
                .assistants
                .create(NewAssistant {
                    name: arg.to_string(),
                    instructions: settings.system_prompt,
                    model: settings.model.as_str().to_string(),
                })
                .await?;
            utils::print_success(&format!("Created profile {}", profile.id));
        }
        "use" => match app.assistants.select(arg).await {
            Ok(()) => {
                // Feed the selected profile into the settings record
                let profile = app.assistants.current().await;
                app.settings
                    .update(SettingsPatch {
                        system_prompt: Some(profile.instructions.clone()),
                        model: Model::parse(&profile.model),
                        ..Default::default()
                    })
                    .await?;
                utils::print_success(&format!("Using profile '{}'", profile.name));
            }
            Err(e) => utils::print_error(&e.to_string()),
        },
        "settings" => {
            let settings = app.settings.snapshot().await;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        _ => utils::print_error("Unknown command, try /help"),
    }

    Ok(true)
}

async fn handle_settings(app: &ChatApp, command: SettingsCommands) -> Result<()> {
    match command {
        SettingsCommands::Show => {
            let settings = app.settings.snapshot().await;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsCommands::Set {
            temperature,
            max_tokens,
            model,
            system_prompt,
        } => {
            let model = match model {
                Some(name) => Some(
                    Model::parse(&name)
                        .ok_or_else(|| anyhow::anyhow!("unsupported model: {}", name))?,
                ),
                None => None,
            };

            app.settings
                .update(SettingsPatch {
                    temperature,
                    max_tokens,
                    model,
                    system_prompt,
                    ..Default::default()
                })
                .await?;
            utils::print_success("Settings saved");
        }
    }

    Ok(())
}

async fn handle_history(app: &ChatApp, command: HistoryCommands) -> Result<()> {
    match command {
        HistoryCommands::List => {
            for conversation in app.conversations.conversations().await {
                println!(
                    "{}  {}  ({} messages)",
                    conversation.id,
                    conversation.title,
                    conversation.messages.len()
                );
            }
        }
        HistoryCommands::Delete { id } => {
            app.conversations.delete(&id).await?;
            utils::print_success("Deleted");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sicha::{Message, Settings};

    #[tokio::test]
    async fn offline_client_refuses_instead_of_panicking() {
        let history: Vec<Message> = Vec::new();
        let request = CompletionRequest::from_history(&Settings::default(), &history);
        let err = OfflineCompletion.complete(request).await.unwrap_err();
        assert!(err.to_string().contains("no completion endpoint"));
    }
}
