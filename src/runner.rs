//! Runs a query selection over many files.
//!
//! Parsing and pattern matching are CPU-bound and run in parallel with rayon,
//! a bounded batch of files at a time. Each batch is dispatched to processors
//! through the engine before the next one is parsed, with every key of a file
//! joined in the caller's task.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use futures::future::join_all;
use globset::GlobSet;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::mapping::CustomKeyMapping;
use crate::query::{
    BatchOutcome, ExecutionMode, Language, QueryEngine, QueryError, QueryExecutionContext,
    QueryMatch,
};
use crate::source::ParsedSource;

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules", "vendor", "target"];

/// Which queries to run.
#[derive(Debug, Clone, Default)]
pub enum Selection {
    /// Every query registered for the file's language.
    #[default]
    All,
    /// These query keys, sent to every file; results are keyed by query key.
    Keys(Vec<String>),
    /// Queries registered for the file's language whose key matches the
    /// globs; results are keyed by query key.
    Filter(GlobSet),
    /// A custom mapping; results are keyed by user key.
    Mapping(CustomKeyMapping),
}

/// Options for a run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub selection: Selection,
    /// Skip queries below this priority.
    pub min_priority: Option<i32>,
    /// Report unknown keys and language mismatches as failures.
    pub strict: bool,
    /// Only analyze files in these languages (all when empty).
    pub languages: Vec<Language>,
    /// Files parsed per batch; 0 means one per rayon worker thread.
    pub batch_size: usize,
}

impl RunOptions {
    fn mode(&self) -> ExecutionMode {
        if self.strict {
            ExecutionMode::Strict
        } else {
            ExecutionMode::Lenient
        }
    }
}

/// Results for one file.
#[derive(Debug)]
pub struct FileReport {
    pub path: String,
    pub language: Language,
    pub outcome: BatchOutcome,
}

/// Results for a whole run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    /// Files that could not be analyzed, with the reason.
    pub skipped: Vec<(String, String)>,
}

impl RunReport {
    pub fn result_count(&self) -> usize {
        self.files.iter().map(|f| f.outcome.result_count()).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.files.iter().map(|f| f.outcome.failures.len()).sum()
    }

    /// Whether every query on every file succeeded.
    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }
}

/// A parsed file with its matches computed, ready for dispatch.
struct Prepared {
    path: String,
    context: QueryExecutionContext,
    /// `(result key, query key)` in selection order.
    entries: Vec<(String, String)>,
    matches: HashMap<String, Vec<QueryMatch>>,
    /// Query keys whose pattern did not compile.
    pattern_errors: HashMap<String, String>,
}

/// Collect analyzable files under a path.
///
/// Hidden directories and dependency/build directories are skipped. A file
/// path is returned as-is.
pub fn collect_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            if !e.file_type().is_dir() || e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref())
        })
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let known = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Language::from_extension)
            .is_some();
        if known {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Applies a [`RunOptions`] selection to files through an engine.
pub struct Runner<'e> {
    engine: &'e QueryEngine,
    options: RunOptions,
}

impl<'e> Runner<'e> {
    pub fn new(engine: &'e QueryEngine, options: RunOptions) -> Self {
        Self { engine, options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// `(result key, query key)` pairs to run for a language.
    fn entries_for(&self, language: &Language) -> Vec<(String, String)> {
        let registry = self.engine.registry();
        let entries: Vec<(String, String)> = match &self.options.selection {
            Selection::All => registry
                .queries_for_language(language)
                .iter()
                .map(|q| (q.name().to_string(), q.name().to_string()))
                .collect(),
            Selection::Keys(keys) => keys.iter().map(|k| (k.clone(), k.clone())).collect(),
            Selection::Filter(filter) => registry
                .queries_for_language(language)
                .iter()
                .filter(|q| filter.is_match(q.name()))
                .map(|q| (q.name().to_string(), q.name().to_string()))
                .collect(),
            Selection::Mapping(mapping) => mapping
                .iter()
                .map(|(user, query)| (user.to_string(), query.to_string()))
                .collect(),
        };

        match self.options.min_priority {
            Some(min) => entries
                .into_iter()
                .filter(|(_, key)| {
                    registry
                        .get(key)
                        .map(|q| q.priority() >= min)
                        .unwrap_or(false)
                })
                .collect(),
            None => entries,
        }
    }

    fn prepare(&self, path: &Path) -> Result<Option<Prepared>, QueryError> {
        let parsed = ParsedSource::from_path(path)?;
        let languages = &self.options.languages;
        if !languages.is_empty() && !languages.contains(parsed.language()) {
            return Ok(None);
        }

        let entries = self.entries_for(parsed.language());
        let keys: BTreeSet<&str> = entries.iter().map(|(_, key)| key.as_str()).collect();

        let mut matches = HashMap::new();
        let mut pattern_errors = HashMap::new();
        for key in keys {
            let Some(function) = self.engine.registry().get(key) else {
                continue;
            };
            if !function.supports(parsed.language()) {
                continue;
            }
            match parsed.matches_for(&function) {
                Ok(found) => {
                    matches.insert(key.to_string(), found);
                }
                Err(err) => {
                    pattern_errors.insert(key.to_string(), err.to_string());
                }
            }
        }

        Ok(Some(Prepared {
            path: parsed.path().to_string(),
            context: parsed.context(),
            entries,
            matches,
            pattern_errors,
        }))
    }

    async fn dispatch(&self, prepared: Prepared) -> FileReport {
        let mode = self.options.mode();
        let context = &prepared.context;
        let runs = prepared.entries.iter().map(|(label, key)| {
            let matches = prepared.matches.get(key).map(Vec::as_slice).unwrap_or(&[]);
            let pattern_error = prepared.pattern_errors.get(key);
            async move {
                let result = match pattern_error {
                    Some(message) => Err(QueryError::Pattern {
                        key: key.clone(),
                        message: message.clone(),
                    }),
                    None => self.engine.execute_isolated(key, matches, context, mode).await,
                };
                (label.as_str(), result)
            }
        });

        let mut outcome = BatchOutcome::new();
        for (label, result) in join_all(runs).await {
            outcome.record(label, result);
        }

        FileReport {
            language: prepared.context.language.clone(),
            path: prepared.path,
            outcome,
        }
    }

    fn batch_size(&self) -> usize {
        match self.options.batch_size {
            0 => rayon::current_num_threads().max(1),
            n => n,
        }
    }

    /// Analyze the given files.
    ///
    /// Only one batch of parsed files is held at a time. Files that cannot be
    /// read or parsed are listed in [`RunReport::skipped`] rather than failing
    /// the run.
    pub async fn run(&self, files: &[PathBuf]) -> RunReport {
        let mut report = RunReport::default();
        for batch in files.chunks(self.batch_size()) {
            let prepared: Vec<Result<Option<Prepared>, QueryError>> =
                batch.par_iter().map(|path| self.prepare(path)).collect();

            for (path, result) in batch.iter().zip(prepared) {
                match result {
                    Ok(Some(file)) => report.files.push(self.dispatch(file).await),
                    Ok(None) => {
                        tracing::debug!(file = %path.display(), "language filtered out");
                    }
                    Err(err) => {
                        tracing::warn!(file = %path.display(), error = %err, "skipping file");
                        report.skipped.push((path.display().to_string(), err.to_string()));
                    }
                }
            }
        }

        tracing::info!(
            files = report.files.len(),
            skipped = report.skipped.len(),
            results = report.result_count(),
            failures = report.failure_count(),
            "run complete"
        );
        report
    }
}
