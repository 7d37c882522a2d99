//! Loading a rule file together with everything it transitively imports.
//!
//! Files are visited depth-first with three-colour marking: a file that is
//! reached again while it is still being resolved closes an import cycle.

use crate::rules::ast::RuleFile;
use crate::rules::error::{ParseError, ParseResult};
use crate::rules::parser::parse_source;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Every file reachable from the entry points, keyed by [`SourceLoader::key`].
pub type ParsedFiles = BTreeMap<PathBuf, RuleFile>;

/// Where rule file text comes from.
pub trait SourceLoader {
    fn load(&self, path: &Path) -> io::Result<String>;

    /// The identity of the file at `path`. Two paths with the same key are
    /// the same file and are parsed once.
    fn key(&self, path: &Path) -> PathBuf {
        normalize(path)
    }
}

/// Reads rule files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    /// The canonical path, so symlinks and relative/absolute spellings of
    /// one file collapse. Paths that cannot be canonicalized (usually
    /// missing files) fall back to lexical normalization.
    fn key(&self, path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| normalize(path))
    }
}

/// In-memory rule files, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<PathBuf, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, src: impl Into<String>) -> Self {
        self.insert(path, src);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, src: impl Into<String>) {
        self.files.insert(normalize(&path.into()), src.into());
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        self.files.get(&normalize(path)).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such rule file: {}", path.display()),
            )
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Parses entry files and follows their `#import` directives.
pub struct ImportResolver<L = FsLoader> {
    loader: L,
}

impl ImportResolver<FsLoader> {
    pub fn from_disk() -> Self {
        Self { loader: FsLoader }
    }
}

impl<L: SourceLoader> ImportResolver<L> {
    pub fn new(loader: L) -> Self {
        Self { loader }
    }

    /// Parse `entry` and everything it imports.
    pub fn resolve(&self, entry: &Path) -> ParseResult<ParsedFiles> {
        self.resolve_all(std::slice::from_ref(&entry.to_path_buf()))
    }

    /// Parse several entry files. Files shared between entries are parsed once.
    pub fn resolve_all(&self, entries: &[PathBuf]) -> ParseResult<ParsedFiles> {
        let mut marks = HashMap::new();
        let mut parsed = ParsedFiles::new();
        for entry in entries {
            self.visit(&self.loader.key(entry), None, &mut marks, &mut parsed)?;
        }
        Ok(parsed)
    }

    fn visit(
        &self,
        path: &Path,
        importer: Option<&Path>,
        marks: &mut HashMap<PathBuf, Mark>,
        parsed: &mut ParsedFiles,
    ) -> ParseResult<()> {
        match marks.get(path) {
            Some(Mark::InProgress) => {
                return Err(ParseError::CyclicDependency {
                    file: path.to_path_buf(),
                })
            }
            Some(Mark::Done) => return Ok(()),
            None => {}
        }
        marks.insert(path.to_path_buf(), Mark::InProgress);

        let src = self.loader.load(path).map_err(|source| match importer {
            Some(file) => ParseError::MissingImport {
                file: file.to_path_buf(),
                import: path.to_path_buf(),
                source,
            },
            None => ParseError::Io {
                file: path.to_path_buf(),
                source,
            },
        })?;

        let mut file = parse_source(path, &src)?;
        file.imports = file.imports.iter().map(|p| self.loader.key(p)).collect();
        tracing::debug!(
            "Parsed {} ({} rules, {} imports)",
            path.display(),
            file.rules.len(),
            file.imports.len()
        );

        for import in &file.imports {
            self.visit(import, Some(path), marks, parsed)?;
        }

        marks.insert(path.to_path_buf(), Mark::Done);
        parsed.insert(path.to_path_buf(), file);
        Ok(())
    }
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component where possible.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
