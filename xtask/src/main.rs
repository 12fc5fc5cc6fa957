use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

/// Crates that build format plugin libraries.
const PLUGIN_CRATES: &[&str] = &["genserialize-plugin-json"];

struct BuildOptions {
    out_dir: PathBuf,
    release: bool,
}

impl BuildOptions {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut options = Self {
            out_dir: PathBuf::from("target/plugins"),
            release: true,
        };
        let mut args = args.iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--debug" => options.release = false,
                "--out" => {
                    let dir = args.next().ok_or("--out needs a directory")?;
                    options.out_dir = PathBuf::from(dir);
                }
                other => return Err(format!("unexpected argument `{other}`")),
            }
        }
        Ok(options)
    }

    fn profile(&self) -> &'static str {
        if self.release { "release" } else { "debug" }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        Some("build-plugins") => BuildOptions::parse(&args[1..]).and_then(|o| build_plugins(&o)),
        Some("help") | Some("--help") | None => {
            usage();
            Ok(())
        }
        Some(other) => {
            usage();
            Err(format!("unknown command `{other}`"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn usage() {
    eprintln!("Usage: cargo xtask <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  build-plugins [--out <dir>] [--debug]   build format plugin libraries");
    eprintln!("  help                                    print this message");
}

fn build_plugins(options: &BuildOptions) -> Result<(), String> {
    fs::create_dir_all(&options.out_dir)
        .map_err(|e| format!("cannot create {}: {e}", options.out_dir.display()))?;
    println!(
        "Building {} plugin(s) ({}) into {}",
        PLUGIN_CRATES.len(),
        options.profile(),
        options.out_dir.display()
    );

    let failures: Vec<&str> = PLUGIN_CRATES
        .iter()
        .copied()
        .filter(|name| match build_plugin(name, options) {
            Ok(bytes) => {
                println!("  {name}: {}", format_size(bytes));
                false
            }
            Err(e) => {
                eprintln!("  {name}: {e}");
                true
            }
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(format!("failed to build {}", failures.join(", ")))
    }
}

/// Build one plugin crate and copy its library. Returns the copied size.
fn build_plugin(name: &str, options: &BuildOptions) -> Result<u64, String> {
    let cargo = env::var_os("CARGO").unwrap_or_else(|| "cargo".into());
    let mut build = Command::new(cargo);
    build.args(["build", "--package", name]);
    if options.release {
        build.arg("--release");
    }

    let output = build
        .output()
        .map_err(|e| format!("cannot run cargo: {e}"))?;
    if !output.status.success() {
        return Err(format!(
            "cargo build failed:\n{}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    let file_name = library_file_name(name);
    let built = target_dir().join(options.profile()).join(&file_name);
    copy_library(&built, &options.out_dir.join(&file_name))
}

fn copy_library(from: &Path, to: &Path) -> Result<u64, String> {
    fs::copy(from, to).map_err(|e| format!("cannot copy {}: {e}", from.display()))
}

fn target_dir() -> PathBuf {
    env::var_os("CARGO_TARGET_DIR").map_or_else(|| PathBuf::from("target"), PathBuf::from)
}

/// Name cargo gives a cdylib on the host platform.
fn library_file_name(crate_name: &str) -> String {
    let stem = crate_name.replace('-', "_");
    match env::consts::OS {
        "windows" => format!("{stem}.dll"),
        "macos" => format!("lib{stem}.dylib"),
        _ => format!("lib{stem}.so"),
    }
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    match bytes {
        b if b < KIB => format!("{b} B"),
        b if b < KIB * KIB => format!("{} KiB", b / KIB),
        b => format!("{:.1} MiB", b as f64 / (KIB * KIB) as f64),
    }
}
