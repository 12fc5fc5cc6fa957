use anyhow::Context;
use clap::Parser;
use genserialize::cli::Cli;
use genserialize::{GenSerializeConfig, Pipeline, PipelineContext, PipelineOptions, logging};
use genserialize_codegen::GeneratedFileWriter;
use genserialize_sast::SchemaFileFrontend;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run finished without fatal errors.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let root = std::env::current_dir().context("cannot determine the working directory")?;
    let config = GenSerializeConfig::load(&root, cli.config.as_deref())?;
    let config = cli.apply_to(config);

    let filter = logging::default_filter(config.log_level.as_deref(), cli.verbose);
    logging::init(&filter).context("failed to initialize logging")?;

    let mut context = PipelineContext::new();
    if let Some(dir) = &config.plugins.directory {
        context.load_plugin_dir(dir);
    }
    for path in &config.plugins.paths {
        if let Err(e) = context.load_plugin(path) {
            tracing::warn!(error = %e, "skipping plugin library");
        }
    }

    if cli.list_formats {
        let registry = context.registry();
        for name in registry.format_names() {
            let priority = registry.priority_of(name).unwrap_or_default();
            println!("{name}\t{priority}");
        }
        return Ok(true);
    }

    let frontend = SchemaFileFrontend::with_include_paths(config.frontend.include_paths.clone());
    let writer = match &config.output.directory {
        Some(dir) => GeneratedFileWriter::with_output_dir(dir.clone()),
        None => GeneratedFileWriter::new(),
    };
    let options = PipelineOptions {
        parse_threads: config.pipeline.parse_threads,
        generate_threads: config.pipeline.generate_threads,
    };

    let report = Pipeline::new(&context, &frontend, &writer)
        .with_options(options)
        .run(&cli.sources)?;

    for path in &report.written {
        tracing::info!(path = %path.display(), "generated");
    }
    if report.has_fatal() {
        eprintln!(
            "{} input(s) failed to analyze, {} output(s) failed to write",
            report.analysis_failures.len(),
            report.write_failures.len()
        );
    }
    Ok(!report.has_fatal())
}
