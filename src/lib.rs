//! # hashinclude
//!
//! A library and CLI tool that flattens a text file by recursively replacing
//! `#include` directives with the contents of the files they name, producing
//! one self-contained output.
//!
//! ## Features
//!
//! - Recognizes `#include "path"` and `#include <path>` lines, whitespace-tolerant
//! - Quoted includes resolve next to the including file first, then in the search roots
//! - Angle includes resolve in the search roots only, first root wins
//! - Depth-first, in-order flattening of nested includes
//! - Precise diagnostics naming the failing file and line
//! - Cycle and depth guards, optional atomic output
//!
//! Every other line is copied unchanged: no macros, no conditionals.
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```no_run
//! use hashinclude::{PreprocessConfig, Preprocessor};
//! use std::path::{Path, PathBuf};
//!
//! let config = PreprocessConfig {
//!     include_dirs: vec![PathBuf::from("include")],
//!     ..PreprocessConfig::default()
//! };
//!
//! match Preprocessor::new(config).and_then(|pp| pp.expand_to_string(Path::new("main.c"))) {
//!     Ok(flat) => print!("{flat}"),
//!     Err(e) => eprintln!("Error: {e}"),
//! }
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # Flatten to stdout
//! hashinclude main.c -I include
//!
//! # Flatten to a file, replacing it only on success
//! hashinclude main.c -I include -I vendor -o flat.c --atomic
//!
//! # Show the inclusion graph
//! hashinclude main.c -I include --list=json
//! ```

pub mod directive;
pub mod error;
pub mod preprocess;
pub mod resolve;

// Re-export main types and functions for convenience
pub use directive::{Directive, DirectiveMatcher, IncludeDirective, IncludeKind, find_directives};
pub use error::{PreprocessError, Result};
pub use preprocess::{
    DEFAULT_MAX_DEPTH, IncludeRecord, PreprocessConfig, Preprocessor, preprocess,
};
pub use resolve::{Origin, Resolved, SearchPaths};
