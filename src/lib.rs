// ABOUTME: Library root for exoframe - the deployment orchestration engine.
// ABOUTME: The main binary is in main.rs.

pub mod build;
pub mod cleanup;
pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod launch;
pub mod output;
pub mod plugins;
pub mod proxy;
pub mod runtime;
pub mod secrets;
pub mod status;
pub mod templates;
pub mod types;
