//! CLI for the fd-expr factor expression engine.
//!
//! This binary lists and describes the registered operators and alpha sets,
//! parses expressions, and evaluates them over a CSV panel.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use fd_expr::{
    AlphaRegistry, AlphaSet, Engine, EngineConfig, ErrorPolicy, OperatorInfo,
    OperatorRegistry, Panel, PartitionFailure, cross_sectional_standardize, parse,
};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

type CliResult<T> = std::result::Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "fd-expr")]
#[command(about = "Factor expression engine for symbol-by-date panels", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all available operators
    List,
    /// Show information about a specific operator
    Info {
        /// Operator name or alias
        operator: String,
    },
    /// List the built-in alpha sets, or the factors of one set
    Alphas {
        /// Alpha set name
        set: Option<String>,
    },
    /// Parse an expression and print its canonical form
    Parse {
        /// Factor expression
        expression: String,
    },
    /// Evaluate expressions over a CSV panel
    Eval {
        /// CSV file with entity, timestamp and field columns
        #[arg(long)]
        data: PathBuf,
        /// JSON engine configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Abort on the first partition failure
        #[arg(long)]
        strict: bool,
        /// Print only the cross-section on this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Cross-sectionally z-score every numeric factor column
        #[arg(long)]
        standardize: bool,
        /// Evaluate a built-in alpha set ahead of any listed expressions
        #[arg(long)]
        alpha: Option<String>,
        /// Append the alpha set's forward-return label
        #[arg(long, requires = "alpha")]
        label: bool,
        /// Expressions, optionally named as `name=expression`
        #[arg(required_unless_present = "alpha")]
        factors: Vec<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::List => {
            list_operators(&OperatorRegistry::global());
            Ok(())
        }
        Commands::Info { operator } => show_operator_info(&OperatorRegistry::global(), &operator),
        Commands::Alphas { set } => show_alphas(&AlphaRegistry::with_defaults(), set.as_deref()),
        Commands::Parse { expression } => show_parse(&expression),
        Commands::Eval {
            data,
            config,
            strict,
            date,
            standardize,
            alpha,
            label,
            factors,
        } => evaluate(
            &data,
            config.as_deref(),
            EvalOptions {
                strict,
                date,
                standardize,
                alpha,
                label,
            },
            &factors,
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// List canonical operators grouped by category.
fn list_operators(registry: &OperatorRegistry) {
    let mut by_category: BTreeMap<String, Vec<OperatorInfo>> = BTreeMap::new();
    for info in registry.all_info() {
        if info.name == info.canonical {
            by_category.entry(info.category.to_string()).or_default().push(info);
        }
    }

    let total: usize = by_category.values().map(Vec::len).sum();
    println!("Available Operators ({total} total, {} names)\n", registry.len());

    for (category, operators) in &by_category {
        println!("{category}:");
        for info in operators {
            println!("  {}{} - {}", info.name, info.signature, info.description);
        }
        println!();
    }
}

/// Show detailed information about one operator.
fn show_operator_info(registry: &OperatorRegistry, name: &str) -> CliResult<()> {
    let all_info = registry.all_info();
    let Some(info) = all_info.iter().find(|i| i.name == name) else {
        let mut message = format!("Operator '{name}' not found\n\nAvailable operators:");
        for info in all_info.iter().filter(|i| i.name == i.canonical) {
            message.push_str(&format!("\n  {}", info.name));
        }
        return Err(message.into());
    };

    let aliases = aliases_of(&all_info, &info.canonical);

    println!("Operator: {}", info.canonical);
    println!("Category: {}", info.category);
    println!("Mode: {}", info.mode);
    println!("Output: {}", info.output);
    println!("Description: {}", info.description);
    println!("Signature: {}{}", info.canonical, info.signature);
    println!("Arguments: {}", info.signature.arity());
    for param in &info.signature.params {
        match param.default {
            Some(default) => println!("  - {} ({}, default {default})", param.name, param.kind),
            None => println!("  - {} ({}, required)", param.name, param.kind),
        }
    }
    if !aliases.is_empty() {
        println!("Aliases: {}", aliases.join(", "));
    }
    Ok(())
}

fn aliases_of<'a>(all_info: &'a [OperatorInfo], canonical: &str) -> Vec<&'a str> {
    all_info
        .iter()
        .filter(|i| i.canonical == canonical && i.name != canonical)
        .map(|i| i.name.as_str())
        .collect()
}

/// List alpha sets, or every factor of the named set.
fn show_alphas(registry: &AlphaRegistry, name: Option<&str>) -> CliResult<()> {
    let Some(name) = name else {
        println!("Available Alpha Sets ({} total)\n", registry.len());
        for set in registry.iter() {
            println!("  {} ({} factors) - {}", set.name(), set.fields_names().len(), set.description());
        }
        return Ok(());
    };

    let set = find_alpha(registry, name)?;
    println!("Alpha set: {}", set.name());
    println!("Description: {}", set.description());
    println!("Definitions:");
    for (name, expression) in set.definitions() {
        println!("  {name} = {expression}");
    }
    println!("Factors:");
    for (name, expression) in set.fields_names() {
        println!("  {name} = {expression}");
    }
    let (label, expression) = set.label();
    println!("Label: {label} = {expression}");
    Ok(())
}

fn find_alpha<'a>(registry: &'a AlphaRegistry, name: &str) -> CliResult<&'a dyn AlphaSet> {
    registry.get(name).ok_or_else(|| {
        format!(
            "Alpha set '{name}' not found\n\nAvailable alpha sets: {}",
            registry.names().join(", ")
        )
        .into()
    })
}

fn show_parse(expression: &str) -> CliResult<()> {
    let expr = parse(expression)?;
    println!("Canonical: {expr}");
    println!("Fields: {}", expr.identifiers().join(", "));
    println!("Operators: {}", expr.calls().join(", "));
    Ok(())
}

/// Split `name=expression`; an unnamed expression is named by its text.
fn named_factor(factor: &str) -> (&str, &str) {
    if let Some((name, expression)) = factor.split_once('=')
        && is_identifier(name.trim())
        && !expression.starts_with('=')
    {
        return (name.trim(), expression.trim());
    }
    (factor.trim(), factor.trim())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn load_config(path: Option<&Path>, strict: bool) -> CliResult<EngineConfig> {
    let mut config = match path {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    if strict {
        config.error_policy = ErrorPolicy::Strict;
    }
    Ok(config)
}

fn read_csv(path: &Path) -> CliResult<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

type NamedList = Vec<(String, String)>;

/// Definitions and factors to evaluate: the alpha set's, then the listed ones.
fn factor_list(
    registry: &AlphaRegistry,
    alpha: Option<&str>,
    label: bool,
    factors: &[String],
) -> CliResult<(NamedList, NamedList)> {
    let mut definitions = Vec::new();
    let mut list = Vec::new();
    if let Some(alpha) = alpha {
        let set = find_alpha(registry, alpha)?;
        definitions = set.definitions();
        list = if label { set.all_features() } else { set.fields_names() };
    }
    list.extend(factors.iter().map(|f| {
        let (name, expression) = named_factor(f);
        (name.to_string(), expression.to_string())
    }));
    Ok((definitions, list))
}

/// Flags of the `eval` command.
struct EvalOptions {
    strict: bool,
    date: Option<NaiveDate>,
    standardize: bool,
    alpha: Option<String>,
    label: bool,
}

fn evaluate(data: &Path, config: Option<&Path>, options: EvalOptions, factors: &[String]) -> CliResult<()> {
    let config = load_config(config, options.strict)?;
    let df = read_csv(data)?;
    let panel = Panel::from_frame(&df, &config.panel)?;
    tracing::info!(rows = panel.len(), fields = panel.field_names().len(), "loaded panel");

    let mut engine = Engine::new(config)?;
    let (definitions, factors_list) =
        factor_list(&AlphaRegistry::with_defaults(), options.alpha.as_deref(), options.label, factors)?;
    for (name, expression) in &definitions {
        engine.define(name, expression)?;
    }
    let named: Vec<(&str, &str)> = factors_list
        .iter()
        .map(|(name, expression)| (name.as_str(), expression.as_str()))
        .collect();

    if let Some(date) = options.date {
        for (name, expression) in &named {
            let evaluation = engine.evaluate(expression, &panel)?;
            println!("{name} @ {date}:");
            for (entity, value) in evaluation.cross_section(&panel, date) {
                match value {
                    Some(value) => println!("  {entity}\t{value}"),
                    None => println!("  {entity}\t-"),
                }
            }
            report_failures(&evaluation.failures);
        }
        return Ok(());
    }

    let result = engine.evaluate_many(&named, &panel)?;
    report_failures(result.failures());
    let mut frame = result.into_frame();
    if options.standardize {
        let time_column = engine.config().panel.time_column.clone();
        for (name, _) in &named {
            if frame.column(name)?.dtype() == &DataType::Float64 {
                frame = cross_sectional_standardize(&frame, name, &time_column)?;
            }
        }
    }

    CsvWriter::new(std::io::stdout().lock()).finish(&mut frame)?;
    Ok(())
}

fn report_failures(failures: &[PartitionFailure]) {
    for failure in failures {
        eprintln!("warning: {failure}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_not_empty() {
        let registry = OperatorRegistry::with_defaults();
        assert!(!registry.is_empty());
        assert!(registry.get("MA").is_some());
    }

    #[test]
    fn test_all_operators_have_info() {
        let registry = OperatorRegistry::with_defaults();
        let all_info = registry.all_info();

        assert_eq!(all_info.len(), registry.len());
        for info in all_info {
            assert!(!info.name.is_empty());
            assert!(!info.description.is_empty());
            assert!(!info.signature.inputs.is_empty());
        }
    }

    #[test]
    fn test_aliases_of() {
        let registry = OperatorRegistry::with_defaults();
        let all_info = registry.all_info();
        let aliases = aliases_of(&all_info, "MA");
        assert!(aliases.contains(&"SMA"));
        assert!(aliases.contains(&"mean"));
        assert!(!aliases.contains(&"MA"));
    }

    #[test]
    fn test_named_factor() {
        assert_eq!(named_factor("mom=roc(close, 5)"), ("mom", "roc(close, 5)"));
        assert_eq!(named_factor("roc(close, 5)"), ("roc(close, 5)", "roc(close, 5)"));
        assert_eq!(named_factor("close == open"), ("close == open", "close == open"));
    }

    #[test]
    fn test_factor_list_with_alpha_set() {
        let registry = AlphaRegistry::with_defaults();
        let factors = vec!["spread=high - low".to_string()];

        let (definitions, list) = factor_list(&registry, Some("value"), true, &factors).unwrap();
        assert_eq!(definitions[0].0, "returns");
        assert_eq!(list.len(), 7);
        assert_eq!(list[0].0, "value_hl_ratio");
        assert_eq!(list[5].0, "label");
        assert_eq!(list[6], ("spread".to_string(), "high - low".to_string()));

        let (definitions, list) = factor_list(&registry, None, false, &factors).unwrap();
        assert!(definitions.is_empty());
        assert_eq!(list.len(), 1);

        let err = factor_list(&registry, Some("alpha360"), false, &[]).unwrap_err();
        assert!(err.to_string().contains("alpha158"));
    }

    #[test]
    fn test_cli_accepts_alpha_without_factors() {
        let cli = Cli::try_parse_from(["fd-expr", "eval", "--data", "bars.csv", "--alpha", "momentum"]).unwrap();
        assert!(matches!(cli.command, Commands::Eval { alpha: Some(ref a), ref factors, .. } if a == "momentum" && factors.is_empty()));
        assert!(Cli::try_parse_from(["fd-expr", "eval", "--data", "bars.csv"]).is_err());
        assert!(Cli::try_parse_from(["fd-expr", "eval", "--data", "bars.csv", "--label", "close"]).is_err());
    }

    #[test]
    fn test_load_config_strict_flag() {
        let config = load_config(None, true).unwrap();
        assert_eq!(config.error_policy, ErrorPolicy::Strict);
        assert_eq!(load_config(None, false).unwrap(), EngineConfig::default());
    }
}
