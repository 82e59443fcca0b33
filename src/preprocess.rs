use crate::directive::{DirectiveMatcher, IncludeKind};
use crate::error::{PreprocessError, Result};
use crate::resolve::{Origin, SearchPaths, containing_dir};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Default limit on include nesting
pub const DEFAULT_MAX_DEPTH: usize = 200;

/// Configuration for include expansion
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Search roots, consulted in order for angle includes and as the
    /// fallback for quoted includes
    pub include_dirs: Vec<PathBuf>,
    /// Maximum include nesting below the entry file
    pub max_depth: usize,
    /// Only match references inside the subtree of the directory searched
    pub confine_to_roots: bool,
    /// Write through a temporary file and move it into place on success
    pub atomic_output: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            include_dirs: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            confine_to_roots: true,
            atomic_output: false,
        }
    }
}

/// One resolved include edge of the inclusion graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncludeRecord {
    /// Reference text as written in the directive
    pub reference: String,
    pub kind: IncludeKind,
    /// File containing the directive
    pub file: PathBuf,
    /// 1-based line of the directive in `file`
    pub line: u64,
    /// File the directive resolved to
    pub resolved: PathBuf,
    pub origin: Origin,
    /// Nesting level of `resolved`; direct includes of the entry file are 1
    pub depth: usize,
}

/// Include flattener bound to one set of search roots
#[derive(Debug, Clone)]
pub struct Preprocessor {
    matcher: DirectiveMatcher,
    search: SearchPaths,
    max_depth: usize,
    atomic_output: bool,
}

impl Preprocessor {
    /// Creates a preprocessor from the given configuration
    ///
    /// # Errors
    ///
    /// Returns `PreprocessError::Regex` if the directive patterns fail to compile.
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        Ok(Self {
            matcher: DirectiveMatcher::new()?,
            search: SearchPaths::new(&config.include_dirs, config.confine_to_roots),
            max_depth: config.max_depth,
            atomic_output: config.atomic_output,
        })
    }

    #[must_use]
    pub fn search_paths(&self) -> &SearchPaths {
        &self.search
    }

    /// Flattens `input` into the file at `output`, truncating it.
    ///
    /// The input is opened before the output is touched. Unless atomic
    /// output is configured, a failed expansion leaves the prefix written
    /// before the failing directive in `output`.
    ///
    /// # Errors
    ///
    /// - `PreprocessError::EntryOpen` if `input` cannot be opened.
    /// - `PreprocessError::OutputOpen` if `output` cannot be created.
    /// - `PreprocessError::UnresolvedInclude` if any directive in the
    ///   inclusion graph names a file that cannot be found.
    /// - `PreprocessError::CyclicInclude` or `PreprocessError::DepthExceeded`
    ///   for runaway nesting.
    /// - `PreprocessError::IncludeOpen`, `PreprocessError::Io` or
    ///   `PreprocessError::Persist` for filesystem failures.
    pub fn preprocess(&self, input: &Path, output: &Path) -> Result<()> {
        let reader = open_entry(input)?;

        if self.atomic_output {
            let dir = containing_dir(output);
            let mut staged = tempfile::Builder::new()
                .prefix(".hashinclude")
                .tempfile_in(&dir)
                .map_err(|source| PreprocessError::OutputOpen {
                    path: output.to_path_buf(),
                    source,
                })?;
            {
                let mut writer = BufWriter::new(staged.as_file_mut());
                self.run(input, reader, &mut writer)?;
            }
            staged.persist(output)?;
            tracing::info!(output = %output.display(), "output written atomically");
            return Ok(());
        }

        let file = File::create(output).map_err(|source| PreprocessError::OutputOpen {
            path: output.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        self.run(input, reader, &mut writer)?;
        tracing::info!(output = %output.display(), "output written");
        Ok(())
    }

    /// Flattens `input` into an arbitrary writer
    ///
    /// # Errors
    ///
    /// Same as [`Preprocessor::preprocess`], minus the output file errors.
    pub fn expand_into<W: Write>(&self, input: &Path, out: &mut W) -> Result<()> {
        let reader = open_entry(input)?;
        self.run(input, reader, out).map(drop)
    }

    /// Flattens `input` into a string
    ///
    /// # Errors
    ///
    /// Same as [`Preprocessor::expand_into`].
    pub fn expand_to_string(&self, input: &Path) -> Result<String> {
        let mut buffer = Vec::new();
        self.expand_into(input, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| PreprocessError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Resolves the whole inclusion graph of `input` without producing output.
    ///
    /// Records come back in the order expansion would reach them.
    ///
    /// # Errors
    ///
    /// Fails exactly where [`Preprocessor::expand_into`] would.
    pub fn dependencies(&self, input: &Path) -> Result<Vec<IncludeRecord>> {
        let reader = open_entry(input)?;
        self.run(input, reader, &mut io::sink())
    }

    /// Runs one top-level expansion and flushes `out` whether or not it succeeded.
    fn run<W: Write>(
        &self,
        input: &Path,
        reader: BufReader<File>,
        out: &mut W,
    ) -> Result<Vec<IncludeRecord>> {
        let identity = fs::canonicalize(input).unwrap_or_else(|_| input.to_path_buf());
        let mut expansion = Expansion {
            preprocessor: self,
            out,
            active: vec![identity],
            records: Vec::new(),
        };

        let result = expansion.expand_file(input, reader, 0);
        let flushed = expansion.out.flush();
        result?;
        flushed?;
        Ok(expansion.records)
    }
}

fn open_entry(input: &Path) -> Result<BufReader<File>> {
    File::open(input)
        .map(BufReader::new)
        .map_err(|source| PreprocessError::EntryOpen {
            path: input.to_path_buf(),
            source,
        })
}

/// State of one top-level expansion: the shared sink and the stack of files
/// currently being expanded
struct Expansion<'a, W: Write> {
    preprocessor: &'a Preprocessor,
    out: &'a mut W,
    active: Vec<PathBuf>,
    records: Vec<IncludeRecord>,
}

impl<W: Write> Expansion<'_, W> {
    fn expand_file<R: BufRead>(&mut self, file: &Path, mut reader: R, depth: usize) -> Result<()> {
        let _span = tracing::debug_span!("expand", file = %file.display(), depth).entered();
        let current_dir = containing_dir(file);
        let mut buffer = Vec::new();
        let mut line_number = 0u64;

        // Lines are opaque bytes; only `\n` is stripped and re-added
        loop {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }
            line_number += 1;
            let line = buffer.strip_suffix(b"\n").unwrap_or(buffer.as_slice());

            match self.preprocessor.matcher.classify(line).include() {
                Some((kind, reference)) => {
                    self.include(kind, &reference, file, &current_dir, line_number, depth)?;
                }
                None => {
                    self.out.write_all(line)?;
                    self.out.write_all(b"\n")?;
                }
            }
        }

        Ok(())
    }

    fn include(
        &mut self,
        kind: IncludeKind,
        reference: &str,
        file: &Path,
        current_dir: &Path,
        line: u64,
        depth: usize,
    ) -> Result<()> {
        let Some(resolved) = self
            .preprocessor
            .search
            .resolve(kind, reference, current_dir)
        else {
            tracing::debug!(reference, file = %file.display(), line, "unknown include file");
            return Err(PreprocessError::UnresolvedInclude {
                reference: reference.to_string(),
                file: file.to_path_buf(),
                line,
            });
        };

        let depth = depth + 1;
        if depth > self.preprocessor.max_depth {
            return Err(PreprocessError::DepthExceeded {
                max_depth: self.preprocessor.max_depth,
                file: file.to_path_buf(),
                line,
            });
        }

        let open_error = |source| PreprocessError::IncludeOpen {
            path: resolved.path.clone(),
            source,
        };
        let identity = fs::canonicalize(&resolved.path).map_err(open_error)?;
        if let Some(start) = self.active.iter().position(|active| *active == identity) {
            let mut chain = self.active[start..].to_vec();
            chain.push(identity.clone());
            return Err(PreprocessError::CyclicInclude {
                path: identity,
                chain,
            });
        }
        let handle = File::open(&resolved.path).map_err(open_error)?;

        tracing::debug!(
            reference,
            %kind,
            origin = %resolved.origin,
            path = %resolved.path.display(),
            depth,
            "resolved include"
        );
        self.records.push(IncludeRecord {
            reference: reference.to_string(),
            kind,
            file: file.to_path_buf(),
            line,
            resolved: resolved.path.clone(),
            origin: resolved.origin,
            depth,
        });

        self.active.push(identity);
        let result = self.expand_file(&resolved.path, BufReader::new(handle), depth);
        self.active.pop();
        result
    }
}

/// Flattens `input` into `output`, searching `include_dirs` in order
///
/// # Errors
///
/// See [`Preprocessor::preprocess`].
pub fn preprocess(input: &Path, output: &Path, include_dirs: &[PathBuf]) -> Result<()> {
    let config = PreprocessConfig {
        include_dirs: include_dirs.to_vec(),
        ..PreprocessConfig::default()
    };
    Preprocessor::new(config)?.preprocess(input, output)
}
