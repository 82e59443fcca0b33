use crate::directive::IncludeKind;
use serde::Serialize;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Where a resolved include was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "index")]
pub enum Origin {
    /// Relative to the directory of the including file
    CurrentDir,
    /// Under the search root at this position in the search list
    SearchRoot(usize),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CurrentDir => f.write_str("current directory"),
            Self::SearchRoot(index) => write!(f, "search root #{index}"),
        }
    }
}

/// A reference mapped to a concrete file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub path: PathBuf,
    pub origin: Origin,
}

/// Ordered search roots shared by every level of one expansion
#[derive(Debug, Clone, Default)]
pub struct SearchPaths {
    roots: Vec<PathBuf>,
    confine: bool,
}

impl SearchPaths {
    /// Builds the search list, keeping the first occurrence of duplicate roots.
    ///
    /// With `confine` set, a reference only matches inside the subtree of the
    /// directory it is joined to; `..`, absolute and drive-prefixed
    /// references never match.
    #[must_use]
    pub fn new(roots: &[PathBuf], confine: bool) -> Self {
        let mut unique: Vec<PathBuf> = Vec::with_capacity(roots.len());
        for root in roots {
            if !unique.contains(root) {
                unique.push(root.clone());
            }
        }
        Self {
            roots: unique,
            confine,
        }
    }

    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Maps a reference to a file.
    ///
    /// Quoted references are tried relative to `current_dir` first and then
    /// against each search root in order. Angle references skip
    /// `current_dir` entirely. The first existing regular file wins.
    #[must_use]
    pub fn resolve(&self, kind: IncludeKind, reference: &str, current_dir: &Path) -> Option<Resolved> {
        if kind == IncludeKind::Quoted
            && let Some(path) = self.probe(current_dir, reference)
        {
            return Some(Resolved {
                path,
                origin: Origin::CurrentDir,
            });
        }

        self.roots.iter().enumerate().find_map(|(index, root)| {
            self.probe(root, reference).map(|path| Resolved {
                path,
                origin: Origin::SearchRoot(index),
            })
        })
    }

    fn probe(&self, dir: &Path, reference: &str) -> Option<PathBuf> {
        if !dir.is_dir() {
            tracing::trace!(dir = %dir.display(), "skipping missing search directory");
            return None;
        }

        let candidate = if self.confine {
            dir.join(confined_relative(reference)?)
        } else {
            dir.join(reference)
        };

        let found = candidate.is_file();
        tracing::trace!(candidate = %candidate.display(), found, "probing include candidate");
        found.then_some(candidate)
    }
}

/// Normalizes a reference to a path that stays inside the directory it is
/// joined to, dropping `.` components. Returns `None` for references that
/// climb with `..`, are rooted, or name nothing.
fn confined_relative(reference: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(reference).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                tracing::debug!(reference, "reference escapes its search directory");
                return None;
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(relative)
}

/// The directory that quoted includes of `file` are resolved against
#[must_use]
pub fn containing_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "content").unwrap();
    }

    #[test]
    fn test_quoted_prefers_current_dir() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let current = base.join("src");
        let root = base.join("include");
        touch(&current.join("common.h"));
        touch(&root.join("common.h"));

        let paths = SearchPaths::new(&[root], true);
        let resolved = paths
            .resolve(IncludeKind::Quoted, "common.h", &current)
            .unwrap();
        assert_eq!(resolved.path, current.join("common.h"));
        assert_eq!(resolved.origin, Origin::CurrentDir);
    }

    #[test]
    fn test_quoted_falls_back_to_roots() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let current = base.join("src");
        fs::create_dir_all(&current).unwrap();
        let root = base.join("include");
        touch(&root.join("lib/std2.h"));

        let paths = SearchPaths::new(&[root.clone()], true);
        let resolved = paths
            .resolve(IncludeKind::Quoted, "lib/std2.h", &current)
            .unwrap();
        assert_eq!(resolved.path, root.join("lib/std2.h"));
        assert_eq!(resolved.origin, Origin::SearchRoot(0));
    }

    #[test]
    fn test_angle_skips_current_dir() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let current = base.join("src");
        touch(&current.join("local.h"));
        let root = base.join("include");
        fs::create_dir_all(&root).unwrap();

        let paths = SearchPaths::new(&[root.clone()], true);
        assert!(paths.resolve(IncludeKind::Angle, "local.h", &current).is_none());

        touch(&root.join("local.h"));
        let resolved = paths.resolve(IncludeKind::Angle, "local.h", &current).unwrap();
        assert_eq!(resolved.path, root.join("local.h"));
    }

    #[test]
    fn test_first_root_wins() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let first = base.join("first");
        let second = base.join("second");
        touch(&first.join("shared.h"));
        touch(&second.join("shared.h"));

        let paths = SearchPaths::new(&[first.clone(), second.clone()], true);
        let resolved = paths.resolve(IncludeKind::Angle, "shared.h", base).unwrap();
        assert_eq!(resolved.path, first.join("shared.h"));
        assert_eq!(resolved.origin, Origin::SearchRoot(0));

        let paths = SearchPaths::new(&[second.clone(), first], true);
        let resolved = paths.resolve(IncludeKind::Angle, "shared.h", base).unwrap();
        assert_eq!(resolved.path, second.join("shared.h"));
    }

    #[test]
    fn test_missing_roots_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let present = base.join("present");
        touch(&present.join("std1.h"));

        let paths = SearchPaths::new(&[base.join("absent"), present.clone()], true);
        let resolved = paths.resolve(IncludeKind::Angle, "std1.h", base).unwrap();
        assert_eq!(resolved.path, present.join("std1.h"));
        assert_eq!(resolved.origin, Origin::SearchRoot(1));
    }

    #[test]
    fn test_directories_do_not_resolve() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        fs::create_dir_all(base.join("subdir")).unwrap();

        let paths = SearchPaths::new(&[], true);
        assert!(paths.resolve(IncludeKind::Quoted, "subdir", base).is_none());
    }

    #[test]
    fn test_duplicate_roots_removed() {
        let roots = vec![
            PathBuf::from("a"),
            PathBuf::from("b"),
            PathBuf::from("a"),
        ];
        let paths = SearchPaths::new(&roots, true);
        assert_eq!(paths.roots(), &[PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test]
    fn test_confinement() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let current = base.join("src");
        fs::create_dir_all(&current).unwrap();
        touch(&base.join("outside.h"));

        let confined = SearchPaths::new(&[], true);
        assert!(confined.resolve(IncludeKind::Quoted, "../outside.h", &current).is_none());

        let open = SearchPaths::new(&[], false);
        let resolved = open
            .resolve(IncludeKind::Quoted, "../outside.h", &current)
            .unwrap();
        assert_eq!(resolved.path, current.join("../outside.h"));
    }

    #[test]
    fn test_confined_relative() {
        assert_eq!(confined_relative("a/b.h"), Some(PathBuf::from("a/b.h")));
        assert_eq!(confined_relative("./a/./b.h"), Some(PathBuf::from("a/b.h")));
        assert_eq!(confined_relative("a/../b.h"), None);
        assert_eq!(confined_relative("/etc/passwd"), None);
        assert_eq!(confined_relative(""), None);
        assert_eq!(confined_relative("."), None);
    }

    #[test]
    fn test_containing_dir() {
        assert_eq!(containing_dir(Path::new("a.cpp")), PathBuf::from("."));
        assert_eq!(
            containing_dir(Path::new("sources/dir1/b.h")),
            PathBuf::from("sources/dir1")
        );
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(Origin::CurrentDir.to_string(), "current directory");
        assert_eq!(Origin::SearchRoot(2).to_string(), "search root #2");
    }
}
