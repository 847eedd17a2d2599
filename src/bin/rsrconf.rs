//! rsrconf CLI - preprocess relaxed-JSON configs and try out RSR rules
//!
//! Reads configuration sources the way the library loads them and evaluates
//! rule strings against sample data from the command line.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rsrconf::converter::ConverterRegistry;
use rsrconf::loader::{self, decode_slice};
use rsrconf::rsr::compiler::DYNAMIC_PREFIX;
use rsrconf::{RsrParsers, Settings};

#[derive(Parser)]
#[command(name = "rsrconf")]
#[command(version, about = "Relaxed-JSON config preprocessing and RSR rule evaluation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a source as strict JSON
    Normalize {
        /// Config file to read (stdin when omitted)
        input: Option<PathBuf>,

        /// Leave *env:NAME tokens untouched
        #[arg(long)]
        no_env: bool,

        /// Pretty-print the result
        #[arg(short, long)]
        pretty: bool,
    },

    /// Validate a config file and compile the rules it contains
    Check {
        /// Config file to validate
        config: PathBuf,

        /// Compile every string value starting with `~` as a rule set
        #[arg(short, long)]
        rules: bool,
    },

    /// Evaluate a rule string against data or a single value
    Eval {
        /// Rule string, e.g. "~*req.Account;-;~*req.Subject"
        #[arg(short, long)]
        rule: String,

        /// JSON file (relaxed syntax allowed) used as data provider
        #[arg(short, long, conflicts_with = "value")]
        data: Option<PathBuf>,

        /// Single value the rules are applied to
        #[arg(short, long)]
        value: Option<String>,

        /// Rule separator (defaults to RSR_SEPARATOR or ";")
        #[arg(short, long)]
        separator: Option<String>,
    },

    /// List the available converters
    Converters,
}

fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Normalize {
            input,
            no_env,
            pretty,
        } => normalize(input, no_env, pretty),
        Commands::Check { config, rules } => check(&config, rules),
        Commands::Eval {
            rule,
            data,
            value,
            separator,
        } => eval(&rule, data, value, separator),
        Commands::Converters => list_converters(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn read_input(input: Option<&Path>) -> Result<Vec<u8>, String> {
    match input {
        Some(path) => std::fs::read(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e)),
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .map_err(|e| format!("Failed to read stdin: {}", e))?;
            Ok(buf)
        }
    }
}

/// Print the normalized form of a source
fn normalize(input: Option<PathBuf>, no_env: bool, pretty: bool) -> Result<(), String> {
    let source = read_input(input.as_deref())?;

    let output = if pretty {
        let value: Value = if no_env {
            let normalized = loader::normalize_only(source.as_slice()).map_err(|e| e.to_string())?;
            serde_json::from_slice(&normalized).map_err(|e| e.to_string())?
        } else {
            decode_slice(&source).map_err(|e| e.to_string())?
        };
        serde_json::to_vec_pretty(&value).map_err(|e| e.to_string())?
    } else if no_env {
        loader::normalize_only(source.as_slice()).map_err(|e| e.to_string())?
    } else {
        loader::preprocess(source.as_slice()).map_err(|e| e.to_string())?
    };

    let mut stdout = io::stdout().lock();
    stdout
        .write_all(&output)
        .and_then(|_| writeln!(stdout))
        .map_err(|e| format!("Failed to write output: {}", e))
}

/// Validate a config file
fn check(config: &Path, rules: bool) -> Result<(), String> {
    let value: Value = loader::load_file(config).map_err(|e| e.to_string())?;
    println!("✓ {} is valid", config.display());

    if rules {
        let settings = Settings::from_env();
        let mut failures = Vec::new();
        let mut compiled = 0;
        collect_rules(&value, String::new(), &mut |pointer, text| {
            match RsrParsers::compile_with(text, &settings) {
                Ok(_) => compiled += 1,
                Err(e) => failures.push(format!("  {}: {}", pointer, e)),
            }
        });

        if !failures.is_empty() {
            return Err(format!(
                "{} rule set(s) failed to compile:\n{}",
                failures.len(),
                failures.join("\n")
            ));
        }
        println!("✓ {} rule set(s) compiled", compiled);
    }
    Ok(())
}

/// Visit every string value starting with `~`, with its JSON pointer.
fn collect_rules(value: &Value, pointer: String, visit: &mut impl FnMut(&str, &str)) {
    match value {
        Value::String(text) if text.starts_with(DYNAMIC_PREFIX) => visit(&pointer, text),
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                collect_rules(item, format!("{}/{}", pointer, idx), visit);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let escaped = key.replace('~', "~0").replace('/', "~1");
                collect_rules(item, format!("{}/{}", pointer, escaped), visit);
            }
        }
        _ => {}
    }
}

/// Evaluate a rule string
fn eval(
    rule: &str,
    data: Option<PathBuf>,
    value: Option<String>,
    separator: Option<String>,
) -> Result<(), String> {
    let mut settings = Settings::from_env();
    if let Some(separator) = separator {
        settings = settings.with_separator(separator);
    }
    let parsers = RsrParsers::compile_with(rule, &settings).map_err(|e| e.to_string())?;

    let output = match (data, value) {
        (Some(path), _) => {
            let provider: Value = loader::load_file(&path).map_err(|e| e.to_string())?;
            parsers.parse_provider(&provider)
        }
        (None, Some(value)) => parsers.parse_value(&value),
        (None, None) => parsers.parse_provider(&Value::Object(Default::default())),
    }
    .map_err(|e| e.to_string())?;

    println!("{}", output);
    Ok(())
}

/// List registered converters
fn list_converters() -> Result<(), String> {
    for name in ConverterRegistry::builtin().list_converters() {
        println!("{}", name);
    }
    Ok(())
}
