//! Binary entry point for rapidstock.
//!
//! Every invocation opens the catalog database, runs the startup resync
//! (continuing without search if the index is unreachable), then executes the
//! selected command.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use rapidstock::cli;
use rapidstock::config::RapidstockConfig;
use rapidstock::observability;
use rapidstock::services::{BackendFactory, ServiceSet};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

/// Rapidstock - product catalog with a synchronized search index.
#[derive(Parser)]
#[command(name = "rapidstock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "RAPIDSTOCK_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Rebuild the search index from the database and print the report.
    Resync,

    /// Show database and search health.
    Health {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Search a collection.
    Search {
        /// Collection: products, categories, or attributes.
        kind: String,

        /// Query text.
        query: String,
    },

    /// Manage categories.
    Category {
        /// Category subcommand.
        #[command(subcommand)]
        action: CategoryAction,
    },

    /// Manage products.
    Product {
        /// Product subcommand.
        #[command(subcommand)]
        action: ProductAction,
    },

    /// Manage product attributes.
    Attribute {
        /// Attribute subcommand.
        #[command(subcommand)]
        action: AttributeAction,
    },
}

/// Category subcommands.
#[derive(Subcommand)]
enum CategoryAction {
    /// Add a category.
    Add {
        /// Category name.
        name: String,

        /// Description.
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Update a category.
    Update {
        /// Category id.
        id: i64,

        /// New name.
        name: String,

        /// New description.
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete a category with no products.
    Delete {
        /// Category id.
        id: i64,
    },

    /// List categories.
    List,
}

/// Product subcommands.
#[derive(Subcommand)]
enum ProductAction {
    /// Add a product.
    Add {
        /// Product name.
        name: String,

        /// Category id.
        #[arg(short, long)]
        category: i64,

        /// Description.
        #[arg(short, long)]
        description: Option<String>,

        /// Attribute as name=value (repeatable).
        #[arg(short, long = "attr")]
        attr: Vec<String>,
    },

    /// Replace a product and its attributes.
    Update {
        /// Product id.
        id: i64,

        /// New name.
        name: String,

        /// Category id.
        #[arg(short, long)]
        category: i64,

        /// Description.
        #[arg(short, long)]
        description: Option<String>,

        /// Attribute as name=value (repeatable); replaces existing attributes.
        #[arg(short, long = "attr")]
        attr: Vec<String>,
    },

    /// Delete a product and its attributes.
    Delete {
        /// Product id.
        id: i64,
    },

    /// List products.
    List,

    /// Show a product with its attributes.
    Show {
        /// Product id.
        id: i64,
    },
}

/// Attribute subcommands.
#[derive(Subcommand)]
enum AttributeAction {
    /// Add an attribute to a product.
    Add {
        /// Product id.
        product_id: i64,

        /// Attribute name.
        name: String,

        /// Attribute value.
        value: String,
    },

    /// Update an attribute.
    Update {
        /// Attribute id.
        id: i64,

        /// New name.
        name: String,

        /// New value.
        value: String,
    },

    /// Delete an attribute.
    Delete {
        /// Attribute id.
        id: i64,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match RapidstockConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_settings(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Builds services, runs the startup resync, then the selected command.
fn run_command(cli: Cli, config: &RapidstockConfig) -> anyhow::Result<()> {
    let ServiceSet { catalog, sync } = BackendFactory::create_services(config)?;
    let report = cli::run_startup_resync(&sync);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Resync => cli::cmd_resync(report.as_ref(), &mut out),
        Commands::Health { json } => cli::cmd_health(&sync, json, &mut out),
        Commands::Search { kind, query } => cli::cmd_search(&sync, &kind, &query, &mut out),
        Commands::Category { action } => match action {
            CategoryAction::Add { name, description } => {
                cli::cmd_category_add(&catalog, name, description, &mut out)
            },
            CategoryAction::Update {
                id,
                name,
                description,
            } => cli::cmd_category_update(&catalog, id, name, description, &mut out),
            CategoryAction::Delete { id } => cli::cmd_category_delete(&catalog, id, &mut out),
            CategoryAction::List => cli::cmd_category_list(&catalog, &mut out),
        },
        Commands::Product { action } => match action {
            ProductAction::Add {
                name,
                category,
                description,
                attr,
            } => cli::cmd_product_add(&catalog, name, description, category, &attr, &mut out),
            ProductAction::Update {
                id,
                name,
                category,
                description,
                attr,
            } => cli::cmd_product_update(&catalog, id, name, description, category, &attr, &mut out),
            ProductAction::Delete { id } => cli::cmd_product_delete(&catalog, id, &mut out),
            ProductAction::List => cli::cmd_product_list(&catalog, &mut out),
            ProductAction::Show { id } => cli::cmd_product_show(&catalog, id, &mut out),
        },
        Commands::Attribute { action } => match action {
            AttributeAction::Add {
                product_id,
                name,
                value,
            } => cli::cmd_attribute_add(&catalog, product_id, name, value, &mut out),
            AttributeAction::Update { id, name, value } => {
                cli::cmd_attribute_update(&catalog, id, name, value, &mut out)
            },
            AttributeAction::Delete { id } => cli::cmd_attribute_delete(&catalog, id, &mut out),
        },
    }?;

    out.flush()?;
    Ok(())
}
