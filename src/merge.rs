// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Union merge of source directories into a target directory.
//!
//! A __merge__ keeps a target directory populated with symbolic links to the
//! immediate subdirectories of one or more __source roots__. Nothing is
//! copied, and nothing below the first level of a source root is considered.
//!
//! # Merge Pipeline
//!
//! Each run goes through the following steps in order:
//!
//! 1. Enumerate candidate subdirectories of every source root, skipping names
//!    that match an ignore pattern. See [`source`].
//! 2. Build the desired mapping of link name to source path, and abort if any
//!    name is claimed twice. See [`clash`].
//! 3. Check that target only holds symbolic links and the marker. See
//!    [`reap`].
//! 4. Grant write access to target. See [`guard`].
//! 5. Remove broken links attributable to a current source root. See
//!    [`reap`].
//! 6. Create or update links to match the desired mapping, and create the
//!    marker. See [`link`].
//! 7. Take write access to target away again, whether or not the previous
//!    steps succeeded.
//!
//! Steps 1 through 3 never touch target. Any failure there leaves target
//! exactly as it was found.
//!
//! # Concurrency
//!
//! Merges are single-threaded, and do not lock target. Running two merges
//! against the same target at the same time is up to the caller to prevent.
//! Every link removal or creation is atomic on its own, so an interrupted run
//! leaves target partially updated, but never broken. Just run it again.

pub mod clash;
pub mod guard;
pub mod link;
pub mod reap;
pub mod source;

use crate::{
    config::MergeDefinition,
    merge::{
        clash::{ClashError, DesiredMapping},
        guard::{PermissionError, WriteGuard},
        link::{ensure_marker, synchronize, LinkError},
        reap::{reap_stale, ReapError, TargetListing},
        source::{ensure_directory, ConfigurationError, IgnoreFilter, SourceRoot},
    },
};

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};
use tracing::{error, info, instrument};

/// Name of reserved entry that marks a target as managed by symunion.
pub const MARKER: &str = ".symunion";

/// Union merge of source roots into one target directory.
#[derive(Debug, Clone)]
pub struct UnionMerge {
    target: PathBuf,
    sources: Vec<SourceRoot>,
    filter: IgnoreFilter,
}

impl UnionMerge {
    /// Construct new union merge.
    ///
    /// Validates target and source roots up front, and compiles ignore
    /// patterns. Nothing is modified.
    ///
    /// # Errors
    ///
    /// - Return [`MergeError::Configuration`] if target or any source root is
    ///   missing or not a directory, if no source roots are given, or if an
    ///   ignore pattern is invalid.
    pub fn new(
        target: impl AsRef<Path>,
        sources: impl IntoIterator<Item = impl AsRef<Path>>,
        ignore: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self> {
        let target = ensure_directory(target)?;
        let sources = sources
            .into_iter()
            .map(SourceRoot::new)
            .collect::<Result<Vec<_>, _>>()?;
        if sources.is_empty() {
            return Err(ConfigurationError::NoSources.into());
        }
        let filter = IgnoreFilter::new(ignore)?;

        Ok(Self {
            target,
            sources,
            filter,
        })
    }

    /// Construct new union merge from merge definition.
    ///
    /// # Errors
    ///
    /// - Return [`MergeError::Configuration`] for the same reasons as
    ///   [`UnionMerge::new`].
    pub fn from_definition(definition: &MergeDefinition) -> Result<Self> {
        Self::new(
            definition.target.as_path(),
            definition.sources.iter().map(|source| source.as_path()),
            definition.ignore.iter().flatten(),
        )
    }

    /// Path of target directory.
    pub fn target(&self) -> &Path {
        self.target.as_path()
    }

    /// Source roots in the order they were given.
    pub fn sources(&self) -> &[SourceRoot] {
        self.sources.as_slice()
    }

    /// Compute desired mapping without touching target.
    ///
    /// # Errors
    ///
    /// - Return [`MergeError::Configuration`] if a source root cannot be
    ///   enumerated.
    /// - Return [`MergeError::Clash`] if any name is claimed by more than one
    ///   source path.
    pub fn plan(&self) -> Result<DesiredMapping> {
        let mut candidates = Vec::new();
        for source in &self.sources {
            candidates.extend(source.candidates(&self.filter)?);
        }

        Ok(DesiredMapping::build(candidates)?)
    }

    /// Perform union merge.
    ///
    /// Target is only modified once every precondition holds. Write access to
    /// target is revoked on the way out, even if reaping or linking fails.
    ///
    /// # Errors
    ///
    /// - Return [`MergeError::Configuration`] or [`MergeError::Clash`] if
    ///   planning fails.
    /// - Return [`MergeError::Reap`] if target holds entries other than links
    ///   and the marker, or if stale links cannot be removed.
    /// - Return [`MergeError::Permission`] if write access cannot be granted
    ///   or revoked.
    /// - Return [`MergeError::Link`] if links or marker cannot be created.
    #[instrument(skip(self), fields(target = %self.target.display()), level = "debug")]
    pub fn run(&self) -> Result<SyncReport> {
        let mapping = self.plan()?;
        let listing = TargetListing::scan(&self.target)?;

        let guard = WriteGuard::acquire(&self.target)?;
        let result = self.reconcile(&listing, &mapping);
        let report = settle(result, guard.release())?;

        info!(
            "merged {} links into {}",
            mapping.len(),
            self.target.display()
        );

        Ok(report)
    }

    fn reconcile(&self, listing: &TargetListing, mapping: &DesiredMapping) -> Result<SyncReport> {
        let stale = reap_stale(listing, &self.sources)?;
        let changes = synchronize(&self.target, mapping)?;
        let marker_created = ensure_marker(&self.target)?;

        Ok(SyncReport {
            linked: changes.linked,
            relinked: changes.relinked,
            unchanged: changes.unchanged,
            reaped: stale.reaped,
            kept: stale.kept,
            marker_created,
        })
    }
}

/// Pick the error to report once write access has been taken away again.
///
/// A failed reconcile wins over a failed release, but the release failure
/// still gets logged so the caller learns that target may be left writable.
fn settle<T>(result: Result<T>, released: guard::Result<()>) -> Result<T> {
    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(revoke)) => Err(revoke.into()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(revoke)) => {
            error!("{revoke:?}");
            Err(err)
        }
    }
}

/// Record of what a merge did to target.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Names that got a new link.
    pub linked: Vec<OsString>,

    /// Names whose outdated link got replaced.
    pub relinked: Vec<OsString>,

    /// Names whose link was already correct.
    pub unchanged: Vec<OsString>,

    /// Broken links that were removed.
    pub reaped: Vec<PathBuf>,

    /// Broken links left alone, because no current source root owns them.
    pub kept: Vec<PathBuf>,

    /// Whether the marker had to be created.
    pub marker_created: bool,
}

impl SyncReport {
    /// Check if merge left target contents exactly as they were.
    pub fn is_noop(&self) -> bool {
        self.linked.is_empty()
            && self.relinked.is_empty()
            && self.reaped.is_empty()
            && !self.marker_created
    }
}

/// All possible error types for union merges.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// Target or source roots are misconfigured.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Source roots claim the same name.
    #[error(transparent)]
    Clash(#[from] ClashError),

    /// Target integrity check or stale link removal fails.
    #[error(transparent)]
    Reap(#[from] ReapError),

    /// Write access to target cannot be changed.
    #[error(transparent)]
    Permission(#[from] PermissionError),

    /// Links or marker cannot be created.
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Friendly result alias :3
pub type Result<T, E = MergeError> = std::result::Result<T, E>;
