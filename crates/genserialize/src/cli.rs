//! Command-line interface.

use crate::config::GenSerializeConfig;
use clap::Parser;
use std::path::PathBuf;

/// Generate serialization code for annotated types.
///
/// Each SOURCE is a schema description (`*.sast.json` or `*.sast.toml`) of one
/// annotated source file. A header with the generated routines is written for
/// every source that declares serializable types.
#[derive(Debug, Parser)]
#[command(name = "genserialize", version, about)]
pub struct Cli {
    /// Schema descriptions to process.
    #[arg(value_name = "SOURCES", required_unless_present = "list_formats")]
    pub sources: Vec<PathBuf>,

    /// Analysis threads (0 = one per CPU).
    #[arg(short = 'p', long, value_name = "N", default_value_t = 0)]
    pub parse_threads: usize,

    /// Generation threads (0 = one per CPU).
    #[arg(short = 'g', long, value_name = "N", default_value_t = 0)]
    pub generate_threads: usize,

    /// Directory scanned for format plugin libraries.
    #[arg(long, value_name = "DIR")]
    pub plugin_dir: Option<PathBuf>,

    /// Format plugin library to load (repeatable).
    #[arg(long = "plugin", value_name = "PATH")]
    pub plugins: Vec<PathBuf>,

    /// Extra directory searched for inputs (repeatable).
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    pub include_paths: Vec<PathBuf>,

    /// Write generated headers here instead of next to each source.
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Config file applied after the global and project configs.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print registered formats with their priorities and exit.
    #[arg(long)]
    pub list_formats: bool,

    /// Log debug output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Overlay the flags that were given on top of `config`.
    pub fn apply_to(&self, config: GenSerializeConfig) -> GenSerializeConfig {
        let mut flags = GenSerializeConfig::default();
        flags.pipeline.parse_threads = self.parse_threads;
        flags.pipeline.generate_threads = self.generate_threads;
        flags.plugins.directory = self.plugin_dir.clone();
        flags.plugins.paths = self.plugins.clone();
        flags.frontend.include_paths = self.include_paths.clone();
        flags.output.directory = self.output_dir.clone();
        config.merge(flags)
    }
}
