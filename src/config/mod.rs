mod settings;

pub use settings::{Model, Settings, SettingsPatch, SettingsStore};
