use clap::{Parser, ValueEnum};
use hashinclude::{
    DEFAULT_MAX_DEPTH, IncludeRecord, PreprocessConfig, Preprocessor, Result, find_directives,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const LONG_HELP: &str = r#"
Directives:
  #include "path"      - Search next to the including file, then each -I dir
  #include <path>      - Search each -I dir only
  Whitespace is allowed around '#', 'include' and the delimited path.
  Any other line, including malformed directives, is copied unchanged.

Examples:
  # Flatten to stdout
  hashinclude main.c -I include
  # Several search roots, first match wins
  hashinclude main.c -I include -I vendor/include
  # Write to a file, replacing it only if every include resolves
  hashinclude main.c -I include -o flat.c --atomic
  # Check that every include resolves (dry run)
  hashinclude main.c -I include --dry-run
  # List the inclusion graph
  hashinclude main.c -I include --list
  # As JSON for scripting
  hashinclude main.c -I include --list=json
  # Search roots from the environment
  HASHINCLUDE_PATH=include:vendor hashinclude main.c
"#;

/// Flatten text files by recursively resolving #include directives.
///
/// Copyright 2025 0x484558 @ aleph0 s.r.o.
/// Licensed under the EUPL v1.2.
#[derive(Parser, Debug)]
#[command(
    name = "hashinclude",
    version,
    author = "0x484558 @ aleph0 s.r.o.",
    about = "Flatten text files by recursively resolving #include directives.",
    after_long_help = LONG_HELP
)]
struct Cli {
    /// Entry file to flatten
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Search root for includes (repeatable, searched in order)
    #[arg(short = 'I', long = "include-dir", value_name = "DIR", action = clap::ArgAction::Append)]
    include_dirs: Vec<PathBuf>,

    /// Additional search roots, searched after -I directories
    #[arg(long, value_name = "PATHS", env = "HASHINCLUDE_PATH", hide_env_values = true)]
    include_path: Option<std::ffi::OsString>,

    /// Maximum include nesting depth
    #[arg(long, value_name = "DEPTH", default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Write through a temporary file and replace the output only on success
    #[arg(long, requires = "output")]
    atomic: bool,

    /// Allow references that leave their search directory ("../x", "/x")
    #[arg(long)]
    allow_escape: bool,

    /// Resolve every include without writing output
    #[arg(long, conflicts_with_all = ["list", "output"])]
    dry_run: bool,

    /// List resolved includes (optionally with format: plain, detailed, json)
    #[arg(long, value_name = "FORMAT", num_args = 0..=1, default_missing_value = "plain", conflicts_with = "output")]
    list: Option<ListFormat>,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum ListFormat {
    /// One resolved path per include, indented by depth
    Plain,
    /// Directive location, origin and resolved path of each include
    Detailed,
    /// JSON output for scripting
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let preprocessor = match Preprocessor::new(build_config(&cli)) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    let result = if cli.dry_run {
        dry_run(&preprocessor, &cli)
    } else if let Some(list_format) = cli.list {
        list_includes(&preprocessor, &cli, list_format)
    } else {
        flatten(&preprocessor, &cli)
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Maps -q/-v to a default level; `RUST_LOG` still takes precedence
fn init_tracing(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::INFO,
        (false, 2) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn build_config(cli: &Cli) -> PreprocessConfig {
    let mut include_dirs = cli.include_dirs.clone();
    if let Some(paths) = &cli.include_path {
        include_dirs.extend(std::env::split_paths(paths).filter(|p| !p.as_os_str().is_empty()));
    }

    PreprocessConfig {
        include_dirs,
        max_depth: cli.max_depth,
        confine_to_roots: !cli.allow_escape,
        atomic_output: cli.atomic,
    }
}

fn flatten(preprocessor: &Preprocessor, cli: &Cli) -> Result<()> {
    tracing::info!("Flattening {}", cli.input.display());

    if let Some(output_path) = &cli.output {
        preprocessor.preprocess(&cli.input, output_path)?;
        tracing::info!("Wrote {}", output_path.display());
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        preprocessor.expand_into(&cli.input, &mut handle)?;
        handle.flush()?;
    }

    Ok(())
}

fn dry_run(preprocessor: &Preprocessor, cli: &Cli) -> Result<()> {
    tracing::info!("Performing dry run - resolving includes...");

    let records = preprocessor.dependencies(&cli.input)?;
    let direct = find_directives(&std::fs::read(&cli.input)?)?.len();
    let deepest = records.iter().map(|r| r.depth).max().unwrap_or(0);

    if !cli.quiet {
        println!("\nSummary: {} includes resolved", records.len());
        println!("  {direct} in {}", cli.input.display());
        println!("  nesting depth {deepest}");
    }

    Ok(())
}

fn list_includes(preprocessor: &Preprocessor, cli: &Cli, format: ListFormat) -> Result<()> {
    tracing::debug!("Listing includes of {}", cli.input.display());

    let records = preprocessor.dependencies(&cli.input)?;

    match format {
        ListFormat::Plain => {
            for record in &records {
                println!(
                    "{}{}",
                    "  ".repeat(record.depth.saturating_sub(1)),
                    record.resolved.display()
                );
            }
        }
        ListFormat::Detailed => {
            for record in &records {
                print_detailed(record);
            }
        }
        ListFormat::Json => {
            let json = serde_json::to_string_pretty(&records)?;
            println!("{json}");
        }
    }

    Ok(())
}

fn print_detailed(record: &IncludeRecord) {
    println!("Include: {} ({})", record.reference, record.kind);
    println!("  From: {}:{}", record.file.display(), record.line);
    println!("  Resolved: {}", record.resolved.display());
    println!("  Origin: {}", record.origin);
    println!("  Depth: {}", record.depth);
    println!();
}
