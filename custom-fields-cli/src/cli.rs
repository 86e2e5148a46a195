//! CLI definition for the `custom-fields` command-line interface.
//!
//! Only depends on `clap` and `std`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Custom Fields - preview and query tool for field form descriptors.
///
/// Descriptor files hold a form document (`object_type` plus `items`) or a
/// bare list of field descriptors, as JSON or YAML.
#[derive(Parser, Debug)]
#[command(name = "custom-fields")]
#[command(version)]
#[command(about = "Preview and query tool for custom field form descriptors")]
#[command(
    long_about = "Renders custom field form descriptors to HTML, queries remote option \
    endpoints, summarizes stored values and decodes submitted forms.\n\n\
    Configuration is read from custom-fields.{toml,yaml,yml,json} in the working \
    directory, or from --config.\n\n\
    Environment variables:\n  \
    CUSTOM_FIELDS_API__URL    Base URL of the option endpoints\n  \
    CUSTOM_FIELDS_API__NONCE  Request token sent with option queries\n  \
    RUST_LOG                  Log filter (default: warn)"
)]
pub struct Cli {
    /// Enable debug output to stderr
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Configuration file to use instead of the discovered one
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a descriptor file to HTML
    Render {
        /// Descriptor file (.json, .yaml or .yml)
        file: PathBuf,
        /// Wait this long for remote options before the final render
        #[arg(long, value_name = "MS", default_value_t = 0)]
        settle_ms: u64,
    },

    /// Query the remote options of one field
    Options {
        /// Descriptor file (.json, .yaml or .yml)
        file: PathBuf,
        /// Id of a top-level remote field
        field: String,
        /// Search text
        #[arg(short, long, default_value = "")]
        search: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a plain-text summary of the form values
    Summary {
        /// Descriptor file (.json, .yaml or .yml)
        file: PathBuf,
        /// JSON object of values by field id (defaults to the descriptor values)
        #[arg(long, value_name = "FILE")]
        values: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode posted form inputs into typed values
    Decode {
        /// Descriptor file (.json, .yaml or .yml)
        file: PathBuf,
        /// JSON object of posted input names to raw string values
        #[arg(long, value_name = "FILE")]
        posted: PathBuf,
    },

    /// List the registered field types
    Kinds,
}
