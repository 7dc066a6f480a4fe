//! Configuration commands.

use anyhow::Result;
use tessera::AttributeAuthority;

use super::load_project;

/// Show the merged configuration.
pub fn show(project: &str, json: bool) -> Result<()> {
    let config = load_project(project)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("{}", config.to_toml()?);
    }

    Ok(())
}

/// Validate the configuration and build an authority from it.
pub fn validate(project: &str) -> Result<()> {
    let config = load_project(project)?;

    match AttributeAuthority::from_config(&config) {
        Ok(authority) => {
            println!("✓ Configuration is valid");
            println!("  Authority: {}", authority.id());
            println!(
                "  Attribute definitions: {}",
                authority.resolver().definition_ids().len()
            );
            println!(
                "  Data connectors: {}",
                authority.resolver().connector_ids().len()
            );
            println!(
                "  Filter policies: {}",
                authority.attribute_filter().policies().len()
            );
            Ok(())
        }
        Err(e) => {
            println!("✗ Configuration validation failed:");
            println!("  {e}");
            Err(e.into())
        }
    }
}
