//! Two-phase generation pipeline.
//!
//! 1. **Analysis.** Inputs are split into contiguous chunks, one per worker.
//!    Each worker opens its own front-end session. When all workers are done
//!    their results are merged into one [`SchemaStore`] and linked.
//! 2. **Generation.** The non-empty files of the linked store are split the
//!    same way; each worker generates code for its files and hands it to the
//!    [`OutputSink`]. Workers only read the schema.
//!
//! Failures of a single file, a missing plugin or a single (type, format)
//! pair never stop the run. They are collected in the [`RunReport`].

use genserialize_codegen::{
    CodeGenerator, GenerationIssue, LoadError, OutputSink, PluginLoader, PluginRegistry,
    WriteError,
};
use genserialize_sast::{AnalyzeError, Frontend, LinkReport, SastResult, SchemaStore};
use rayon::prelude::*;
use std::ops::Range;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no input files")]
    NoInputs,
    #[error("failed to start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Plugins available to a run.
///
/// Loading takes `&mut self` and running takes `&self`, so every plugin is
/// registered before any worker starts.
#[derive(Debug)]
pub struct PipelineContext {
    registry: PluginRegistry,
    loader: PluginLoader,
}

impl PipelineContext {
    /// A context holding the built-in plugins.
    pub fn new() -> Self {
        Self::with_registry(PluginRegistry::with_builtin())
    }

    pub fn with_registry(registry: PluginRegistry) -> Self {
        Self {
            registry,
            loader: PluginLoader::new(),
        }
    }

    /// Load every plugin library in `dir`. Returns how many loaded.
    pub fn load_plugin_dir(&mut self, dir: &Path) -> usize {
        self.loader.load_directory(dir, &mut self.registry)
    }

    pub fn load_plugin(&mut self, path: &Path) -> Result<(), LoadError> {
        self.loader.load_file(path, &mut self.registry)
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker counts per phase. 0 means one per available CPU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    pub parse_threads: usize,
    pub generate_threads: usize,
}

/// An input that could not be analyzed.
#[derive(Debug)]
pub struct AnalysisFailure {
    pub path: PathBuf,
    pub error: AnalyzeError,
}

/// A generated file that could not be written.
#[derive(Debug)]
pub struct WriteFailure {
    pub source: PathBuf,
    pub error: WriteError,
}

/// What a run did.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Inputs analyzed successfully.
    pub files_analyzed: usize,
    pub analysis_failures: Vec<AnalysisFailure>,
    pub link: LinkReport,
    /// Generated files, in source path order.
    pub written: Vec<PathBuf>,
    pub write_failures: Vec<WriteFailure>,
    /// Missing plugins and failed (type, format) pairs.
    pub issues: Vec<GenerationIssue>,
}

impl RunReport {
    /// Whether an input could not be analyzed or an output not be written.
    ///
    /// Generation issues are not fatal.
    pub fn has_fatal(&self) -> bool {
        !self.analysis_failures.is_empty() || !self.write_failures.is_empty()
    }
}

/// One generation run over a set of inputs.
pub struct Pipeline<'a> {
    context: &'a PipelineContext,
    frontend: &'a dyn Frontend,
    sink: &'a dyn OutputSink,
    options: PipelineOptions,
}

struct FileOutcome {
    source: PathBuf,
    written: Result<PathBuf, WriteError>,
    issues: Vec<GenerationIssue>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        context: &'a PipelineContext,
        frontend: &'a dyn Frontend,
        sink: &'a dyn OutputSink,
    ) -> Self {
        Self {
            context,
            frontend,
            sink,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Analyze, link, and generate code for `inputs`.
    pub fn run(&self, inputs: &[PathBuf]) -> Result<RunReport, PipelineError> {
        if inputs.is_empty() {
            return Err(PipelineError::NoInputs);
        }

        let mut report = RunReport::default();
        let store = self.analyze(inputs, &mut report)?;

        report.link = store.link();
        tracing::info!(
            files = store.file_count(),
            types = store.node_count(),
            resolved = report.link.resolved,
            unresolved = report.link.unresolved.len(),
            "analysis finished"
        );

        self.generate(&store, &mut report)?;
        tracing::info!(
            written = report.written.len(),
            write_failures = report.write_failures.len(),
            issues = report.issues.len(),
            "generation finished"
        );

        Ok(report)
    }

    fn analyze(&self, inputs: &[PathBuf], report: &mut RunReport) -> Result<SchemaStore, PipelineError> {
        let threads = resolve_threads(self.options.parse_threads);
        let pool = worker_pool("analyze", threads)?;
        tracing::debug!(inputs = inputs.len(), threads, frontend = self.frontend.name(), "analyzing");

        let chunks: Vec<Vec<Result<SastResult, AnalysisFailure>>> = pool.install(|| {
            partition(inputs.len(), threads)
                .into_par_iter()
                .map(|range| {
                    let mut session = self.frontend.session();
                    inputs[range]
                        .iter()
                        .map(|path| {
                            session.analyze(path).map_err(|error| AnalysisFailure {
                                path: path.clone(),
                                error,
                            })
                        })
                        .collect()
                })
                .collect()
        });

        let mut store = SchemaStore::new();
        for result in chunks.into_iter().flatten() {
            match result {
                Ok(result) => {
                    report.files_analyzed += 1;
                    store.merge(result);
                }
                Err(failure) => {
                    tracing::error!(error = %failure.error, "analysis failed");
                    report.analysis_failures.push(failure);
                }
            }
        }
        Ok(store)
    }

    fn generate(&self, store: &SchemaStore, report: &mut RunReport) -> Result<(), PipelineError> {
        let trees: Vec<_> = store
            .trees()
            .iter()
            .filter(|(_, nodes)| !nodes.is_empty())
            .collect();
        let threads = resolve_threads(self.options.generate_threads);
        let pool = worker_pool("generate", threads)?;
        tracing::debug!(files = trees.len(), threads, "generating");

        let generator = CodeGenerator::new(self.context.registry());
        let chunks: Vec<Vec<FileOutcome>> = pool.install(|| {
            partition(trees.len(), threads)
                .into_par_iter()
                .map(|range| {
                    trees[range]
                        .iter()
                        .map(|(source, nodes)| {
                            let code = generator.generate(nodes);
                            FileOutcome {
                                source: source.to_path_buf(),
                                written: self.sink.write(source, &code),
                                issues: code.issues,
                            }
                        })
                        .collect()
                })
                .collect()
        });

        for outcome in chunks.into_iter().flatten() {
            report.issues.extend(outcome.issues);
            match outcome.written {
                Ok(path) => report.written.push(path),
                Err(error) => {
                    tracing::error!(source = %outcome.source.display(), error = %error, "write failed");
                    report.write_failures.push(WriteFailure {
                        source: outcome.source,
                        error,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Worker count for a configured value: 0 means one per available CPU.
pub fn resolve_threads(configured: usize) -> usize {
    if configured > 0 {
        return configured;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Split `0..len` into at most `parts` contiguous, near-equal, non-empty ranges.
pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, len.max(1));
    let base = len / parts;
    let extra = len % parts;
    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let size = base + usize::from(i < extra);
        if size == 0 {
            break;
        }
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

fn worker_pool(role: &'static str, threads: usize) -> Result<rayon::ThreadPool, PipelineError> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("{role}-{i}"))
        .build()?)
}
