//! Local storage: settings file and on-disk layout

pub mod layout;
pub mod settings;
