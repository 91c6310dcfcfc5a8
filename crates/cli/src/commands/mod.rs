//! Command implementations for panelctl

pub mod discover;
pub mod models;
pub mod probe;
pub mod run;
