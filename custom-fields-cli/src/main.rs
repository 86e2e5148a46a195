//! Custom Fields CLI - preview and query tool for field form descriptors.
//!
//! Commands:
//! - `custom-fields render <file>`: Render a form to HTML, one field per line
//! - `custom-fields options <file> <field>`: Query a remote field's options
//! - `custom-fields summary <file>`: Plain-text summary of the form values
//! - `custom-fields decode <file> --posted <file>`: Decode submitted inputs
//! - `custom-fields kinds`: List the registered field types
//!
//! Environment variables:
//! - CUSTOM_FIELDS_API__URL: Base URL of the option endpoints
//! - CUSTOM_FIELDS_API__NONCE: Request token sent with option queries
//! - RUST_LOG: Log filter when `--debug` is not given
//!
//! Exit codes:
//! - 0: Success
//! - 1: Error

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use custom_fields::FieldsConfig;
use custom_fields_cli::commands;
use custom_fields_cli::{Cli, Commands};

async fn run(command: Commands, config: FieldsConfig) -> anyhow::Result<String> {
    match command {
        Commands::Render { file, settle_ms } => {
            let form = commands::load_form(&file)?;
            Ok(commands::render(&form, config, Duration::from_millis(settle_ms)).await)
        }
        Commands::Options {
            file,
            field,
            search,
            json,
        } => {
            let form = commands::load_form(&file)?;
            let options = commands::options(&form, &config, &field, &search).await?;
            commands::format_options(&options, json)
        }
        Commands::Summary { file, values, json } => {
            let form = commands::load_form(&file)?;
            commands::summary(&form, values.as_deref(), json)
        }
        Commands::Decode { file, posted } => {
            let form = commands::load_form(&file)?;
            commands::decode(&form, &posted)
        }
        Commands::Kinds => Ok(commands::kinds()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("custom_fields=debug,custom_fields_cli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let exit_code = match run(cli.command, config).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_render_with_settle() {
        let cli = Cli::try_parse_from(["custom-fields", "render", "form.yaml", "--settle-ms", "250"])
            .unwrap();
        match cli.command {
            Commands::Render { file, settle_ms } => {
                assert_eq!(file, PathBuf::from("form.yaml"));
                assert_eq!(settle_ms, 250);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "custom-fields",
            "options",
            "form.json",
            "related",
            "-s",
            "news",
            "--json",
            "-d",
            "-c",
            "cf.toml",
        ])
        .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.config, Some(PathBuf::from("cf.toml")));
        match cli.command {
            Commands::Options {
                field, search, json, ..
            } => {
                assert_eq!(field, "related");
                assert_eq!(search, "news");
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_decode_requires_posted() {
        assert!(Cli::try_parse_from(["custom-fields", "decode", "form.json"]).is_err());
    }

    #[tokio::test]
    async fn test_run_kinds() {
        let output = run(Commands::Kinds, FieldsConfig::default()).await.unwrap();
        assert!(output.lines().any(|kind| kind == "select"));
    }
}
