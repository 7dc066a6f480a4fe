//! Tessera CLI.
//!
//! Resolves and releases attributes using the plugins and policies declared
//! in a project's `tessera.toml`.
//!
//! # Quick Start
//!
//! ```bash
//! # Check the configuration builds
//! tessera validate --project ./idp
//!
//! # What would https://sp.example.com receive for jdoe?
//! tessera query --project ./idp --principal jdoe --requester https://sp.example.com
//!
//! # Everything resolved for jdoe, before filtering
//! tessera query --project ./idp --principal jdoe --unfiltered --format json
//! ```

mod commands;
mod table;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Tessera - attribute resolution and release for identity providers.
#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log resolution and filtering decisions to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve attributes for a principal and apply release policies.
    Query {
        /// Principal whose attributes are resolved.
        #[arg(short, long)]
        principal: String,

        /// Relying party requesting the attributes.
        #[arg(short, long)]
        requester: Option<String>,

        /// Issuer releasing the attributes (defaults to the authority id).
        #[arg(short, long)]
        issuer: Option<String>,

        /// Attribute to resolve. Repeat for several; omit for all.
        #[arg(short, long = "attribute")]
        attributes: Vec<String>,

        /// Show resolved attributes without applying filter policies.
        #[arg(long)]
        unfiltered: bool,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: QueryFormat,

        /// Project directory containing tessera.toml.
        #[arg(long, default_value = ".")]
        project: String,
    },

    /// Check that the configuration loads and builds.
    Validate {
        /// Project directory containing tessera.toml.
        #[arg(long, default_value = ".")]
        project: String,
    },

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the merged configuration.
    Show {
        /// Output format.
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ConfigFormat,

        /// Project directory containing tessera.toml.
        #[arg(long, default_value = ".")]
        project: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum QueryFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ConfigFormat {
    Toml,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Query {
            principal,
            requester,
            issuer,
            attributes,
            unfiltered,
            format,
            project,
        } => commands::query::run(&commands::query::QueryArgs {
            project,
            principal,
            requester,
            issuer,
            attributes,
            unfiltered,
            json: matches!(format, QueryFormat::Json),
        }),
        Commands::Validate { project } => commands::config::validate(&project),
        Commands::Config(ConfigCommands::Show { format, project }) => {
            commands::config::show(&project, matches!(format, ConfigFormat::Json))
        }
    }
}
