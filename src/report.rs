//! Output formatting for astquery.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use std::collections::BTreeMap;
use std::sync::Arc;

use colored::*;
use serde::{Deserialize, Serialize};

use crate::mapping::predefined;
use crate::query::{QueryFunction, QueryResult, ValidationReport};
#[cfg(feature = "tree-sitter")]
use crate::runner::{FileReport, RunReport};

/// Widest node text shown per result in pretty output.
const SNIPPET_WIDTH: usize = 72;

// =============================================================================
// JSON Format
// =============================================================================

/// Whole-run JSON report.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport {
    pub version: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    pub files_analyzed: usize,
    pub result_count: usize,
    pub failure_count: usize,
    pub files: Vec<JsonFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<JsonSkipped>,
}

/// Results for one file, keyed by result key.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonFile {
    pub path: String,
    pub language: String,
    pub results: BTreeMap<String, Vec<QueryResult>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<String, String>,
}

/// A file that could not be analyzed.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonSkipped {
    pub path: String,
    pub reason: String,
}

#[cfg(feature = "tree-sitter")]
fn file_to_json(file: &FileReport) -> JsonFile {
    JsonFile {
        path: file.path.clone(),
        language: file.language.to_string(),
        results: file
            .outcome
            .results
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        failures: file
            .outcome
            .failures
            .iter()
            .map(|(k, e)| (k.clone(), e.to_string()))
            .collect(),
    }
}

/// Build the JSON report for a run.
#[cfg(feature = "tree-sitter")]
pub fn json_report(path: &str, config_path: Option<&str>, report: &RunReport) -> JsonReport {
    JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        path: path.to_string(),
        config: config_path.map(str::to_string),
        files_analyzed: report.files.len(),
        result_count: report.result_count(),
        failure_count: report.failure_count(),
        files: report.files.iter().map(file_to_json).collect(),
        skipped: report
            .skipped
            .iter()
            .map(|(path, reason)| JsonSkipped {
                path: path.clone(),
                reason: reason.clone(),
            })
            .collect(),
    }
}

/// Write run results in JSON format.
#[cfg(feature = "tree-sitter")]
pub fn write_json(path: &str, config_path: Option<&str>, report: &RunReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&json_report(path, config_path, report))?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

fn write_header() {
    println!();
    print!("  ");
    print!("{}", "astquery".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();
}

/// First line of a node's text, shortened to fit.
fn snippet(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() > SNIPPET_WIDTH {
        let cut: String = line.chars().take(SNIPPET_WIDTH - 3).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}

/// Write run results in colored terminal format.
#[cfg(feature = "tree-sitter")]
pub fn write_pretty(path: &str, config_path: Option<&str>, report: &RunReport, verbose: bool) {
    write_header();

    print!("  {}", "Analyzing: ".dimmed());
    println!("{}", path);
    if let Some(config) = config_path {
        print!("  {}", "Config:    ".dimmed());
        println!("{}", config);
    }
    println!();

    for file in &report.files {
        write_file(file, verbose);
    }

    for (path, reason) in &report.skipped {
        println!("  {} {} {}", "SKIP".yellow(), path.blue(), reason.dimmed());
    }
    if !report.skipped.is_empty() {
        println!();
    }

    if report.is_clean() {
        print!("  {}", "✓ OK".green());
    } else {
        print!("  {}", "✗ FAILED".red());
    }
    println!(
        "  {} files, {} results, {} failed queries",
        report.files.len(),
        report.result_count(),
        report.failure_count()
    );
    println!();
}

#[cfg(feature = "tree-sitter")]
fn write_file(file: &FileReport, verbose: bool) {
    println!(
        "  {} {}",
        file.path.blue().bold(),
        format!("({})", file.language).dimmed()
    );

    let mut keys: Vec<&String> = file.outcome.results.keys().collect();
    keys.sort();
    for key in keys {
        let results = &file.outcome.results[key];
        if let Some(err) = file.outcome.failures.get(key) {
            println!("    {:<32} {}", key.red(), err.to_string().red());
            continue;
        }
        if results.is_empty() && !verbose {
            continue;
        }
        println!("    {:<32} {}", key.bold(), results.len());
        for result in results {
            let location = &result.location;
            println!(
                "      {} {}",
                format!("{:>4}:{:<3}", location.start_line, location.start_column).dimmed(),
                snippet(&result.node_text)
            );
        }
    }
    println!();
}

/// List registered queries.
pub fn write_query_list(queries: &[Arc<QueryFunction>]) {
    write_header();
    println!("  {} ({}):", "Queries".bold(), queries.len());
    println!();
    for query in queries {
        let languages: Vec<&str> = query.languages().iter().map(|l| l.as_str()).collect();
        println!(
            "    {:<30} {:>3}  {:<14} {}",
            query.name().cyan(),
            query.priority(),
            query.result_type(),
            languages.join(",").dimmed()
        );
        println!("      {}", query.description());
    }
    println!();
}

/// List predefined mappings.
pub fn write_mapping_list() {
    write_header();
    println!("  {}:", "Predefined mappings".bold());
    println!();
    let all = predefined::all();
    for (name, description) in predefined::descriptions() {
        println!("    {:<22} {}", name.cyan(), description);
        if let Some(mapping) = all.get(name) {
            for (user_key, query_key) in mapping.iter() {
                println!("      {:<22} -> {}", user_key, query_key.dimmed());
            }
        }
        println!();
    }
}

/// Report engine validation and mapping problems. Returns whether all is well.
pub fn write_validation(report: &ValidationReport, mapping_errors: &[String]) -> bool {
    write_header();

    for warning in &report.warnings {
        println!("    {} {}", "WARN ".yellow(), warning);
    }
    for error in mapping_errors {
        println!("    {} {}", "ERROR".red(), error);
    }

    let ok = report.is_valid && mapping_errors.is_empty();
    if ok {
        println!("  {}  registry and mappings are valid", "✓ PASS".green());
    } else {
        println!(
            "  {}  {} warnings, {} mapping errors",
            "✗ FAIL".red(),
            report.warnings.len(),
            mapping_errors.len()
        );
    }
    println!();
    ok
}
