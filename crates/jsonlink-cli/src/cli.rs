//! jsonlink CLI - resolve a JSON document and its references
//!
//! Usage:
//!   jsonlink config/app.json
//!   jsonlink config/app.json --var locale=en --format yaml
//!   jsonlink /srv/store.git/conf/app.json#v1.2 --pointer /database
//!   jsonlink config/app.json --describe

use clap::{ArgAction, Parser, ValueEnum};
use colored::Colorize;
use jsonlink_core::{Loader, LoaderOptions, Variables};
use std::path::PathBuf;
use std::process::ExitCode;

/// jsonlink - Load JSON documents with file and git revision references
#[derive(Parser, Debug)]
#[command(name = "jsonlink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Document to load (path, optionally suffixed with #revision)
    reference: String,

    /// Set a variable for ${name} expansion (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    vars: Vec<(String, String)>,

    /// Start from an empty variable context instead of the environment
    #[arg(long)]
    no_env: bool,

    /// Print null instead of failing when the document does not exist
    #[arg(long)]
    optional: bool,

    /// Print only the value at this JSON pointer (e.g., /database/host)
    #[arg(short, long)]
    pointer: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Print JSON on a single line
    #[arg(long)]
    compact: bool,

    /// Write to file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print how the reference is classified instead of loading it
    #[arg(long)]
    describe: bool,

    /// Treat every path as a plain file (no git queries)
    #[arg(long)]
    no_git: bool,

    /// git executable to run
    #[arg(long, value_name = "PROGRAM", default_value = "git")]
    git: String,

    /// Revision read when a repository reference names none
    #[arg(long, value_name = "REV", default_value = jsonlink_core::repository::DEFAULT_REVISION)]
    default_revision: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

fn parse_var(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, _)) if name.is_empty() => Err(format!("missing variable name in '{}'", s)),
        Some((name, value)) => Ok((name.to_string(), value.to_string())),
        None => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Error starting runtime".red(), e);
            return ExitCode::from(2);
        }
    };

    runtime.block_on(execute(cli))
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    // Also installs the log bridge so jsonlink-core's log records show up
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn loader_options(cli: &Cli) -> LoaderOptions {
    LoaderOptions::default()
        .with_git_program(&cli.git)
        .with_default_revision(&cli.default_revision)
        .with_repository_detection(!cli.no_git)
}

fn variables(cli: &Cli) -> Variables {
    let mut vars = if cli.no_env {
        Variables::new()
    } else {
        Variables::from_env()
    };
    for (name, value) in &cli.vars {
        vars.insert(name, value);
    }
    vars
}

async fn execute(cli: Cli) -> ExitCode {
    let loader = Loader::with_options(loader_options(&cli));

    if cli.describe {
        return match loader.source(&cli.reference).await {
            Ok(source) => {
                println!("{}", describe(&source));
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Error".red(), e);
                ExitCode::from(1)
            }
        };
    }

    log::debug!("loading {}", cli.reference);
    let value = match loader
        .load(&cli.reference, &variables(&cli), !cli.optional)
        .await
    {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            return ExitCode::from(1);
        }
    };

    let value = match &cli.pointer {
        Some(pointer) => match value.pointer(pointer) {
            Some(v) => v.clone(),
            None => {
                eprintln!("{}: Pointer '{}' not found", "Error".red(), pointer);
                return ExitCode::from(1);
            }
        },
        None => value,
    };

    let content = match render(&value, cli.format, cli.compact) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            return ExitCode::from(1);
        }
    };

    if let Some(output_path) = cli.output {
        if let Err(e) = std::fs::write(&output_path, &content) {
            eprintln!("{}: {}", "Error writing file".red(), e);
            return ExitCode::from(2);
        }
        eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
    } else {
        print!("{}", content);
    }
    ExitCode::SUCCESS
}

fn render(value: &serde_json::Value, format: Format, compact: bool) -> Result<String, String> {
    match format {
        Format::Json => {
            let json = if compact {
                serde_json::to_string(value)
            } else {
                serde_json::to_string_pretty(value)
            };
            json.map(|s| s + "\n").map_err(|e| e.to_string())
        }
        Format::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
    }
}

fn describe(source: &jsonlink_core::Source) -> String {
    match source.repository_root() {
        Some(root) => format!(
            "repository: {}\nfile: {}\nrevision: {}",
            root.display(),
            source.file_path().display(),
            source.revision().unwrap_or("(default)")
        ),
        None => format!("file: {}", source.file_path().display()),
    }
}
