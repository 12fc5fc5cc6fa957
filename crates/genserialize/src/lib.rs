//! Parallel serialization code generator.
//!
//! Ties the schema model ([`genserialize_sast`]) and the code generators
//! ([`genserialize_codegen`]) into the two-phase [`Pipeline`], and provides
//! the configuration, logging and CLI pieces of the `genserialize` binary.
//!
//! # Example
//!
//! ```no_run
//! use genserialize::{Pipeline, PipelineContext, PipelineOptions};
//! use genserialize_codegen::GeneratedFileWriter;
//! use genserialize_sast::SchemaFileFrontend;
//! use std::path::PathBuf;
//!
//! let mut context = PipelineContext::new();
//! context.load_plugin_dir("target/plugins".as_ref());
//!
//! let frontend = SchemaFileFrontend::new();
//! let writer = GeneratedFileWriter::new();
//! let report = Pipeline::new(&context, &frontend, &writer)
//!     .with_options(PipelineOptions { parse_threads: 4, generate_threads: 0 })
//!     .run(&[PathBuf::from("src/Player.sast.json")])
//!     .unwrap();
//! assert!(!report.has_fatal());
//! ```

pub mod cli;
pub mod config;
pub mod logging;
pub mod pipeline;

pub use genserialize_codegen;
pub use genserialize_sast;

pub use config::{ConfigError, GenSerializeConfig};
pub use pipeline::{
    AnalysisFailure, Pipeline, PipelineContext, PipelineError, PipelineOptions, RunReport,
    WriteFailure, partition, resolve_threads,
};
