//! Command-line interface for astquery.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{self, Config, DEFAULT_CONFIG_NAMES, TEMPLATE};
use crate::packs;
use crate::query::{Language, QueryEngine};
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Query-based AST analysis for TypeScript, JavaScript, Java, Python and Go.
///
/// Runs named tree-sitter queries over source files and prints the
/// structured records their processors produce: imports, exports, type and
/// function definitions, annotations and semantic tags.
#[derive(Parser)]
#[command(name = "astquery")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List registered queries or predefined mappings
    #[command(visible_alias = "ls")]
    List(ListArgs),
    /// Run queries over a file or directory
    Run(RunArgs),
    /// Check registry health and mapping validity
    Validate(ValidateArgs),
    /// Create a starter configuration file
    Init(InitArgs),
}

/// Arguments for the list command.
#[derive(Parser)]
pub struct ListArgs {
    /// Only queries supporting this language
    #[arg(short, long)]
    pub language: Option<String>,

    /// List predefined mappings instead of queries
    #[arg(short, long)]
    pub mappings: bool,
}

/// Arguments for the run command.
#[derive(Parser)]
pub struct RunArgs {
    /// Path to analyze (file or directory)
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Query key glob, e.g. "ts-*" (repeatable)
    #[arg(short, long = "query")]
    pub queries: Vec<String>,

    /// Run a named mapping (config-defined or predefined)
    #[arg(short, long)]
    pub mapping: Option<String>,

    /// Skip queries below this priority
    #[arg(long)]
    pub min_priority: Option<i32>,

    /// Report unknown keys and language mismatches as failures
    #[arg(long)]
    pub strict: bool,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

/// Arguments for the validate command.
#[derive(Parser)]
pub struct ValidateArgs {
    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "astquery.yaml")]
    pub output: PathBuf,
}

/// An explicit config path, or one discovered in the working directory.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<Option<(PathBuf, Config)>> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match Config::discover(Path::new(".")) {
            Some(p) => p,
            None => {
                tracing::debug!(names = ?DEFAULT_CONFIG_NAMES, "no config file found");
                return Ok(None);
            }
        },
    };
    let config = Config::parse_file(&path)
        .map_err(|e| anyhow::anyhow!("error parsing config {}: {}", path.display(), e))?;
    Ok(Some((path, config)))
}

fn engine() -> anyhow::Result<QueryEngine> {
    Ok(packs::standard_engine()?)
}

/// Run the list command.
pub fn run_list(args: &ListArgs) -> anyhow::Result<i32> {
    if args.mappings {
        report::write_mapping_list();
        return Ok(EXIT_SUCCESS);
    }

    let engine = engine()?;
    let queries = match &args.language {
        Some(language) => engine.registry().queries_for_language(&Language::new(language)),
        None => engine.registry().all_queries(),
    };
    report::write_query_list(&queries);
    Ok(EXIT_SUCCESS)
}

/// Run the run command.
#[cfg(feature = "tree-sitter")]
pub fn run_run(args: &RunArgs, verbose: bool) -> anyhow::Result<i32> {
    use crate::runner::{collect_files, RunOptions, Runner, Selection};

    if args.format != "pretty" && args.format != "json" {
        eprintln!("Error: invalid format {:?}, must be 'pretty' or 'json'", args.format);
        return Ok(EXIT_ERROR);
    }

    let loaded = load_config(args.config.as_deref())?;
    let (config_path, mut config) = match loaded {
        Some((path, config)) => (Some(path.display().to_string()), config),
        None => (None, Config::default()),
    };

    // Command-line flags win over the config file.
    if !args.queries.is_empty() {
        config.queries = args.queries.clone();
        config.mapping = None;
    }
    if args.mapping.is_some() {
        config.mapping = args.mapping.clone();
    }
    if args.min_priority.is_some() {
        config.min_priority = args.min_priority;
    }
    config.strict |= args.strict;

    if let Err(e) = config::validate(&config) {
        eprintln!("Error: invalid config: {}", e);
        return Ok(EXIT_ERROR);
    }

    let engine = engine()?;
    let selection = match &config.mapping {
        Some(name) => match config.resolve_mapping(name) {
            Some(mapping) => Selection::Mapping(mapping),
            None => {
                eprintln!("Error: unknown mapping {:?}", name);
                eprintln!("Run 'astquery list --mappings' to see predefined mappings");
                return Ok(EXIT_ERROR);
            }
        },
        None => match config.literal_keys() {
            Some(keys) => Selection::Keys(keys),
            None => match config.query_filter()? {
                Some(filter) => Selection::Filter(filter),
                None => Selection::All,
            },
        },
    };

    if !args.path.exists() {
        eprintln!("Error: cannot access path {:?}", args.path);
        return Ok(EXIT_ERROR);
    }
    let files = collect_files(&args.path)?;
    if files.is_empty() {
        eprintln!("Warning: no files to analyze");
        return Ok(EXIT_SUCCESS);
    }

    let options = RunOptions {
        selection,
        min_priority: config.min_priority,
        strict: config.strict,
        languages: config.languages.clone(),
        ..Default::default()
    };
    let runner = Runner::new(&engine, options);
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let result = runtime.block_on(runner.run(&files));

    let path_str = args.path.to_string_lossy().to_string();
    match args.format.as_str() {
        "json" => report::write_json(&path_str, config_path.as_deref(), &result)?,
        _ => report::write_pretty(&path_str, config_path.as_deref(), &result, verbose),
    }

    if result.is_clean() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

#[cfg(not(feature = "tree-sitter"))]
pub fn run_run(_args: &RunArgs, _verbose: bool) -> anyhow::Result<i32> {
    anyhow::bail!("astquery was built without the tree-sitter feature; 'run' is unavailable")
}

/// Patterns that do not compile against their languages' grammars.
#[cfg(feature = "tree-sitter")]
fn pattern_errors(engine: &QueryEngine) -> Vec<String> {
    let mut errors = Vec::new();
    for query in engine.registry().all_queries() {
        for language in query.languages() {
            if let Err(e) = crate::source::check_pattern(query.name(), language, query.query()) {
                errors.push(format!("{} ({})", e, language));
            }
        }
    }
    errors
}

#[cfg(not(feature = "tree-sitter"))]
fn pattern_errors(_engine: &QueryEngine) -> Vec<String> {
    Vec::new()
}

/// Run the validate command.
pub fn run_validate(args: &ValidateArgs) -> anyhow::Result<i32> {
    let engine = engine()?;
    let health = engine.validate();

    let mut errors = pattern_errors(&engine);
    if let Some((path, config)) = load_config(args.config.as_deref())? {
        tracing::info!(config = %path.display(), "validating config");
        if let Err(e) = config::validate(&config) {
            errors.push(format!("{}: {}", path.display(), e));
        }
        errors.extend(config.mapping_errors(&engine));
    }

    if report::write_validation(&health, &errors) {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    if let Err(e) = std::fs::write(&args.output, TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to choose queries and mappings", args.output.display());
    println!("  2. Run: astquery run . --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}
