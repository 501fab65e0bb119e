mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Labelled YAML fixtures for document stores.
#[derive(Parser)]
#[command(name = "fixset", version, about = "Labelled YAML fixtures for document stores")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load record-sets into an in-memory store and report the documents
    Load {
        /// Path to the TOML model schema
        #[arg(long)]
        schema: PathBuf,
        /// Fixture directory
        #[arg(long, default_value = "fixtures")]
        dir: PathBuf,
        /// Bind a record-set to a model, as `set=Model` (repeatable)
        #[arg(long = "model", value_parser = parse_override)]
        models: Vec<(String, String)>,
        /// Record-set names, in load order
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Print the identifier each label maps to
    Ids {
        /// Fixture labels
        #[arg(required = true)]
        labels: Vec<String>,
    },

    /// Parse record-sets without writing anything
    Check {
        /// Fixture directory
        #[arg(long, default_value = "fixtures")]
        dir: PathBuf,
        /// Bind a record-set to a model, as `set=Model` (repeatable)
        #[arg(long = "model", value_parser = parse_override)]
        models: Vec<(String, String)>,
        /// Record-set names
        #[arg(required = true)]
        names: Vec<String>,
    },
}

fn parse_override(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((set, model)) if !set.trim().is_empty() && !model.trim().is_empty() => {
            Ok((set.trim().to_string(), model.trim().to_string()))
        }
        _ => Err(format!("expected `set=Model`, got '{}'", raw)),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FIXSET_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Load {
            schema,
            dir,
            models,
            names,
        } => commands::load::cmd_load(&schema, &dir, &models, &names, cli.output, cli.quiet),
        Commands::Ids { labels } => {
            commands::ids::cmd_ids(&labels, cli.output, cli.quiet);
            Ok(())
        }
        Commands::Check { dir, models, names } => {
            commands::check::cmd_check(&dir, &models, &names, cli.output, cli.quiet)
        }
    };

    if let Err(msg) = result {
        report_error(&msg, cli.output, cli.quiet);
        process::exit(1);
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_splits_on_first_equals() {
        assert_eq!(
            parse_override("staff=User").unwrap(),
            ("staff".to_string(), "User".to_string())
        );
        assert!(parse_override("staff").is_err());
        assert!(parse_override("=User").is_err());
    }
}
