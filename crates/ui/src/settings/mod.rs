pub mod state;

pub use state::{CouncilSettings, SettingsError, SettingsStore};
