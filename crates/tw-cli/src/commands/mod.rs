//! CLI subcommand implementations.

pub mod activities;
pub mod export;
pub mod history;
pub mod import;
pub mod plan;
pub mod stats;
pub mod status;
pub mod track;
