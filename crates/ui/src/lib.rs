#![deny(unsafe_code)]

/// Application shell: sidebar, conversation area and notification layer.
pub mod app;
/// Conversation view, composer and sidebar.
pub mod chat;
/// Settings persistence.
pub mod settings;
/// Presentation of the three council stages.
pub mod stages;
