// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source directory enumeration.
//!
//! A __source root__ contributes its immediate subdirectories to the union
//! view as __candidates__. Nothing below the first level of a source root is
//! ever looked at, and regular files are skipped entirely.
//!
//! Candidate names can be filtered out through shell-style glob patterns,
//! e.g., `.dropbox.cache` or `*.tmp`. The same filter applies uniformly to
//! every source root.

use crate::merge::MARKER;

use glob::Pattern;
use std::{
    ffi::{OsStr, OsString},
    fs::read_dir,
    path::{absolute, Path, PathBuf},
};
use tracing::{debug, instrument};

/// Directory contributing candidate subdirectories to the union view.
///
/// # Invariant
///
/// - Path is absolute, but symbolic links inside it are left unresolved.
/// - Path pointed to a directory when the root was constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoot(PathBuf);

impl SourceRoot {
    /// Construct new source root.
    ///
    /// Relative paths are made absolute against the current working
    /// directory. Symbolic links are not resolved, because broken links are
    /// attributed to a source root by comparing the paths they store.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigurationError::Missing`] if path does not exist.
    /// - Return [`ConfigurationError::NotADirectory`] if path is not a
    ///   directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self(ensure_directory(path)?))
    }

    /// Treat source root as [`Path`] slice.
    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }

    /// Check if a path lies underneath this source root.
    ///
    /// Compares whole path components, so `/a/bc` is not under `/a/b`.
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().starts_with(&self.0)
    }

    /// List candidate subdirectories of source root.
    ///
    /// Only immediate children that are directories are listed. Children
    /// that are symbolic links to directories count as directories. Any name
    /// matched by the ignore filter is skipped. Candidates are sorted by name.
    ///
    /// Names are kept exactly as the file system reports them, so names that
    /// are not valid UTF-8 stay distinct from one another.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigurationError::ReadRoot`] if source root cannot be
    ///   read.
    /// - Return [`ConfigurationError::ReservedName`] if a candidate would
    ///   collide with the marker entry.
    #[instrument(skip(self, filter), fields(root = %self.0.display()), level = "debug")]
    pub fn candidates(&self, filter: &IgnoreFilter) -> Result<Vec<Candidate>> {
        let read_error = |source| ConfigurationError::ReadRoot {
            source,
            path: self.0.clone(),
        };

        let mut candidates = Vec::new();
        for entry in read_dir(&self.0).map_err(read_error)? {
            let entry = entry.map_err(read_error)?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let name = entry.file_name();
            if filter.is_ignored(&name) {
                debug!("ignoring {}", path.display());
                continue;
            }

            if name == MARKER {
                return Err(ConfigurationError::ReservedName { path });
            }

            candidates.push(Candidate { name, path });
        }
        candidates.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));

        Ok(candidates)
    }
}

/// Subdirectory of a source root that should appear in the union view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Base name of the subdirectory, used as link name in target.
    pub name: OsString,

    /// Absolute path of the subdirectory, used as link destination.
    pub path: PathBuf,
}

/// Filter candidate names through glob patterns.
#[derive(Debug, Default, Clone)]
pub struct IgnoreFilter {
    patterns: Vec<Pattern>,
}

impl IgnoreFilter {
    /// Construct new ignore filter.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigurationError::Pattern`] if any pattern is not a valid
    ///   glob.
    pub fn new(patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Result<Self> {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                Pattern::new(pattern.as_ref()).map_err(|source| ConfigurationError::Pattern {
                    source,
                    pattern: pattern.as_ref().to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Check if a candidate name matches any ignore pattern.
    ///
    /// Patterns are text, so a name that is not valid UTF-8 never matches.
    pub fn is_ignored(&self, name: impl AsRef<OsStr>) -> bool {
        let Some(name) = name.as_ref().to_str() else {
            return false;
        };

        self.patterns.iter().any(|pattern| pattern.matches(name))
    }
}

/// Make path absolute, and ensure it points to a directory.
///
/// # Errors
///
/// - Return [`ConfigurationError::Missing`] if path does not exist.
/// - Return [`ConfigurationError::NotADirectory`] if path is not a directory.
pub(crate) fn ensure_directory(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = absolute(path.as_ref()).map_err(|source| ConfigurationError::Missing {
        source,
        path: path.as_ref().to_path_buf(),
    })?;

    let metadata = path
        .metadata()
        .map_err(|source| ConfigurationError::Missing {
            source,
            path: path.clone(),
        })?;

    if !metadata.is_dir() {
        return Err(ConfigurationError::NotADirectory { path });
    }

    Ok(path)
}

/// Misconfiguration of a merge, detected before anything is touched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// Required path cannot be found.
    #[error("path {:?} does not exist", path.display())]
    Missing {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Required path is not a directory.
    #[error("path {:?} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// No source roots were given.
    #[error("at least one source directory is required")]
    NoSources,

    /// Ignore pattern is not a valid glob.
    #[error("invalid ignore pattern {pattern:?}")]
    Pattern {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },

    /// Source root cannot be listed.
    #[error("failed to read source directory {:?}", path.display())]
    ReadRoot {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Candidate subdirectory shares its name with the marker entry.
    #[error("subdirectory {:?} uses reserved name {:?}", path.display(), MARKER)]
    ReservedName { path: PathBuf },
}

/// Friendly result alias :3
pub type Result<T, E = ConfigurationError> = std::result::Result<T, E>;
