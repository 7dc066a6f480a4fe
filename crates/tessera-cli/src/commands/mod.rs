//! CLI command implementations.

pub mod config;
pub mod query;

use anyhow::{Context, Result};
use std::path::Path;
use tessera_config::{Paths, TesseraConfig};

/// Loads the layered configuration for a project directory.
pub(crate) fn load_project(project: &str) -> Result<TesseraConfig> {
    let project_path = Path::new(project);

    if !Paths::is_initialized(project_path) {
        anyhow::bail!(
            "No tessera.toml found in {}. Create one to declare attributes and policies.",
            project_path.display()
        );
    }

    TesseraConfig::load_from_dir(project_path).context("Failed to load configuration")
}
