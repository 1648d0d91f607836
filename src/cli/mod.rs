mod commands;

pub use commands::{Cli, Commands, HistoryCommands, SettingsCommands};
