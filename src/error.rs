use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for hashinclude operations
#[derive(Error, Debug)]
pub enum PreprocessError {
    /// IO error while reading an input or writing the output stream
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The entry file could not be opened for reading
    #[error("Cannot open input file {path}: {source}")]
    EntryOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The output file could not be created or truncated
    #[error("Cannot open output file {path}: {source}")]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An include directive names a file that exists in no searched location
    #[error("unknown include file {reference} at file {} at line {line}", .file.display())]
    UnresolvedInclude {
        reference: String,
        file: PathBuf,
        line: u64,
    },

    /// A resolved include target exists but could not be opened
    #[error("Cannot open included file {path}: {source}")]
    IncludeOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A file includes itself, directly or through other files
    #[error("Include cycle detected at {}: {}", .path.display(), format_chain(.chain))]
    CyclicInclude { path: PathBuf, chain: Vec<PathBuf> },

    /// Include nesting is deeper than the configured limit
    #[error("Maximum include depth of {max_depth} exceeded at file {} at line {line}", .file.display())]
    DepthExceeded {
        max_depth: usize,
        file: PathBuf,
        line: u64,
    },

    /// Moving the finished temporary output into place failed
    #[error("Cannot persist output file: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// Regex compilation error
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type Result<T> = std::result::Result<T, PreprocessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PreprocessError::UnresolvedInclude {
            reference: "std1.h".to_string(),
            file: PathBuf::from("sources/dir1/subdir/c.h"),
            line: 2,
        };
        assert_eq!(
            format!("{err}"),
            "unknown include file std1.h at file sources/dir1/subdir/c.h at line 2"
        );

        let err = PreprocessError::CyclicInclude {
            path: PathBuf::from("/src/a.h"),
            chain: vec![
                PathBuf::from("/src/a.h"),
                PathBuf::from("/src/b.h"),
                PathBuf::from("/src/a.h"),
            ],
        };
        assert_eq!(
            format!("{err}"),
            "Include cycle detected at /src/a.h: /src/a.h -> /src/b.h -> /src/a.h"
        );

        let err = PreprocessError::DepthExceeded {
            max_depth: 3,
            file: PathBuf::from("deep.h"),
            line: 7,
        };
        assert_eq!(
            format!("{err}"),
            "Maximum include depth of 3 exceeded at file deep.h at line 7"
        );

        let err = PreprocessError::EntryOpen {
            path: PathBuf::from("missing.cpp"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert!(format!("{err}").starts_with("Cannot open input file missing.cpp"));
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error as _;

        let err = PreprocessError::IncludeOpen {
            path: PathBuf::from("locked.h"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let source = err.source().expect("include open carries its io error");
        assert_eq!(source.to_string(), "denied");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "test");
        let err: PreprocessError = io_err.into();
        assert!(matches!(err, PreprocessError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: PreprocessError = json_err.into();
        assert!(matches!(err, PreprocessError::Json(_)));
    }
}
