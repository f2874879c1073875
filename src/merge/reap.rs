// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Target integrity checks and stale link reaping.
//!
//! Target must only ever hold symbolic links, plus the marker entry. Anything
//! else means that somebody tampered with target, and the merge refuses to
//! continue.
//!
//! A link that leads nowhere is __broken__, be it because its destination no
//! longer exists, because a component along the way is not a directory, or
//! because it loops back onto itself. A broken link is
//! only removed when the path it stores lies underneath one of the source
//! roots given to the current run. There is no ledger of links created by
//! previous runs, so a broken link that cannot be attributed to the current
//! source roots is always left alone.

use crate::merge::{source::SourceRoot, MARKER};

use std::{
    fs::{metadata, read_dir, read_link, remove_file},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Snapshot of links in target directory.
///
/// # Invariant
///
/// - Every non-marker entry of target was a symbolic link when scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetListing {
    target: PathBuf,
    links: Vec<PathBuf>,
}

impl TargetListing {
    /// Scan target directory, and check its integrity.
    ///
    /// # Errors
    ///
    /// - Return [`ReapError::ReadTarget`] if target cannot be listed.
    /// - Return [`ReapError::Integrity`] listing every entry that is neither
    ///   the marker nor a symbolic link.
    #[instrument(skip(target), level = "debug")]
    pub fn scan(target: impl Into<PathBuf>) -> Result<Self> {
        let target = target.into();
        let read_error = |source| ReapError::ReadTarget {
            source,
            path: target.clone(),
        };

        let mut links = Vec::new();
        let mut foreign = Vec::new();
        for entry in read_dir(&target).map_err(read_error)? {
            let entry = entry.map_err(read_error)?;
            if entry.file_name() == MARKER {
                continue;
            }

            if entry.file_type().map_err(read_error)?.is_symlink() {
                links.push(entry.path());
            } else {
                foreign.push(entry.path());
            }
        }

        if !foreign.is_empty() {
            foreign.sort();
            return Err(ReapError::Integrity(IntegrityError { entries: foreign }));
        }
        links.sort();

        Ok(Self { target, links })
    }

    /// Path of scanned target directory.
    pub fn target(&self) -> &Path {
        self.target.as_path()
    }

    /// Links found in target directory.
    pub fn links(&self) -> &[PathBuf] {
        self.links.as_slice()
    }
}

/// Broken links found while reaping.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StaleLinks {
    /// Broken links attributed to a source root, and removed.
    pub reaped: Vec<PathBuf>,

    /// Broken links that could not be attributed, and were left alone.
    pub kept: Vec<PathBuf>,
}

/// Remove broken links that point underneath given source roots.
///
/// Links stored with a relative path are resolved against the target
/// directory before being matched against the source roots.
///
/// # Errors
///
/// - Return [`ReapError::Inspect`] if a link cannot be checked for
///   existence.
/// - Return [`ReapError::ReadLink`] if a link cannot be read.
/// - Return [`ReapError::Unlink`] if a link cannot be removed.
#[instrument(skip(listing, roots), level = "debug")]
pub fn reap_stale(listing: &TargetListing, roots: &[SourceRoot]) -> Result<StaleLinks> {
    let mut stale = StaleLinks::default();

    for link in listing.links() {
        let broken = is_broken(link).map_err(|source| ReapError::Inspect {
            source,
            path: link.clone(),
        })?;
        if !broken {
            continue;
        }

        let points_to = read_link(link).map_err(|source| ReapError::ReadLink {
            source,
            path: link.clone(),
        })?;
        let points_to = listing.target().join(points_to);

        if roots.iter().any(|root| root.contains(&points_to)) {
            info!("unlinking broken link {}", link.display());
            remove_file(link).map_err(|source| ReapError::Unlink {
                source,
                path: link.clone(),
            })?;
            stale.reaped.push(link.clone());
        } else {
            warn!(
                "keeping broken link {} -> {}, not under any source directory",
                link.display(),
                points_to.display()
            );
            stale.kept.push(link.clone());
        }
    }

    Ok(stale)
}

/// Check if following a link leads nowhere.
///
/// Errors other than a missing destination, a non-directory path component,
/// or a link loop are passed back, e.g., permission denied on a directory
/// along the way says nothing about whether the destination exists.
fn is_broken(link: &Path) -> std::io::Result<bool> {
    match metadata(link) {
        Ok(_) => Ok(false),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(true),
        Err(err) if matches!(err.raw_os_error(), Some(libc::ELOOP | libc::ENOTDIR)) => Ok(true),
        Err(err) => Err(err),
    }
}

/// Target holds entries that are neither the marker nor symbolic links.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("target holds entries that are not symbolic links: {:?}", .entries)]
pub struct IntegrityError {
    /// Offending entries.
    pub entries: Vec<PathBuf>,
}

/// Stale link reaping error types.
#[derive(Debug, thiserror::Error)]
pub enum ReapError {
    /// Target contains foreign entries.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Target directory cannot be listed.
    #[error("failed to read target directory {:?}", path.display())]
    ReadTarget {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Link destination cannot be checked for existence.
    #[error("failed to inspect link {:?}", path.display())]
    Inspect {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Link cannot be read.
    #[error("failed to read link {:?}", path.display())]
    ReadLink {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Link cannot be removed.
    #[error("failed to unlink {:?}", path.display())]
    Unlink {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ReapError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{
        fs::{create_dir, create_dir_all, write},
        os::unix::fs::symlink,
    };
    use tempfile::TempDir;

    #[test]
    fn scan_accepts_links_and_marker() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let target = tmp.path().join("merged");
        create_dir_all(target.join(MARKER))?;
        create_dir(tmp.path().join("aaa"))?;
        symlink(tmp.path().join("aaa"), target.join("aaa"))?;
        symlink(tmp.path().join("gone"), target.join("gone"))?;

        let listing = TargetListing::scan(&target)?;
        assert_eq!(listing.links(), &[target.join("aaa"), target.join("gone")]);

        Ok(())
    }

    #[test]
    fn scan_rejects_foreign_entries() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        create_dir(tmp.path().join("dir"))?;
        write(tmp.path().join("file"), "oops")?;

        let result = TargetListing::scan(tmp.path());
        match result {
            Err(ReapError::Integrity(error)) => {
                assert_eq!(
                    error.entries,
                    vec![tmp.path().join("dir"), tmp.path().join("file")]
                );
            }
            other => panic!("expected integrity error, got {other:?}"),
        }

        Ok(())
    }

    #[test]
    fn reap_removes_only_attributable_broken_links() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let managed = tmp.path().join("c1");
        let foreign = tmp.path().join("c3");
        let target = tmp.path().join("merged");
        create_dir_all(managed.join("live"))?;
        create_dir_all(&foreign)?;
        create_dir_all(&target)?;

        symlink(managed.join("live"), target.join("live"))?;
        symlink(managed.join("dead"), target.join("dead"))?;
        symlink(foreign.join("zzz"), target.join("zzz"))?;

        let roots = vec![SourceRoot::new(&managed)?];
        let listing = TargetListing::scan(&target)?;
        let result = reap_stale(&listing, &roots)?;

        let expect = StaleLinks {
            reaped: vec![target.join("dead")],
            kept: vec![target.join("zzz")],
        };
        assert_eq!(result, expect);
        assert!(target.join("live").exists());
        assert!(target.join("zzz").symlink_metadata().is_ok());
        assert!(target.join("dead").symlink_metadata().is_err());

        Ok(())
    }

    #[test]
    fn reap_treats_loops_and_file_components_as_broken() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let managed = tmp.path().join("c1");
        let foreign = tmp.path().join("c3");
        let target = tmp.path().join("merged");
        create_dir_all(&managed)?;
        create_dir_all(&foreign)?;
        create_dir_all(&target)?;

        symlink(managed.join("pong"), managed.join("ping"))?;
        symlink(managed.join("ping"), managed.join("pong"))?;
        symlink(foreign.join("spin"), foreign.join("spin"))?;
        write(managed.join("file"), "not a directory")?;

        symlink(managed.join("ping"), target.join("ping"))?;
        symlink(managed.join("file").join("aaa"), target.join("aaa"))?;
        symlink(foreign.join("spin"), target.join("spin"))?;

        let roots = vec![SourceRoot::new(&managed)?];
        let listing = TargetListing::scan(&target)?;
        let result = reap_stale(&listing, &roots)?;

        let expect = StaleLinks {
            reaped: vec![target.join("aaa"), target.join("ping")],
            kept: vec![target.join("spin")],
        };
        assert_eq!(result, expect);
        assert!(target.join("spin").symlink_metadata().is_ok());

        Ok(())
    }

    #[test]
    fn reap_resolves_relative_links_against_target() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let managed = tmp.path().join("c1");
        let target = tmp.path().join("merged");
        create_dir_all(&managed)?;
        create_dir_all(&target)?;
        symlink("../c1/dead", target.join("dead"))?;

        let roots = vec![SourceRoot::new(&managed)?];
        let listing = TargetListing::scan(&target)?;
        let result = reap_stale(&listing, &roots)?;

        // Matching is lexical, so parent components are not collapsed.
        assert_eq!(result.kept, vec![target.join("dead")]);
        assert!(result.reaped.is_empty());

        Ok(())
    }
}
