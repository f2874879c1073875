// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Link synchronization.
//!
//! Bring the links in target up to date with the desired mapping. Links that
//! already point to the right source path are left alone, so running the
//! same merge twice changes nothing the second time around.
//!
//! The synchronizer never removes a link just because its name is missing
//! from the desired mapping. Only the reaper deletes links, and only broken
//! ones.

use crate::merge::{clash::DesiredMapping, MARKER};

use std::{
    ffi::OsString,
    fs::{create_dir, read_link, remove_file},
    io::ErrorKind,
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Outcome of synchronizing links with desired mapping.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkChanges {
    /// Names that had no link, and got one.
    pub linked: Vec<OsString>,

    /// Names whose link pointed elsewhere, and got replaced.
    pub relinked: Vec<OsString>,

    /// Names whose link was already correct.
    pub unchanged: Vec<OsString>,
}

/// Create or update links in target to match desired mapping.
///
/// # Errors
///
/// - Return [`LinkError::ReadLink`] if an existing link cannot be read.
/// - Return [`LinkError::Unlink`] if an outdated link cannot be removed.
/// - Return [`LinkError::Symlink`] if a link cannot be created.
#[instrument(skip(target, mapping), level = "debug")]
pub fn synchronize(target: &Path, mapping: &DesiredMapping) -> Result<LinkChanges> {
    let mut changes = LinkChanges::default();

    for (name, destination) in mapping.iter() {
        let link = target.join(name);
        let replace = match read_link(&link) {
            Ok(points_to) if points_to == destination => {
                debug!("skipping {}, no need to update", link.display());
                changes.unchanged.push(name.to_os_string());
                continue;
            }
            Ok(_) => true,
            Err(err) if err.kind() == ErrorKind::NotFound => false,
            Err(source) => return Err(LinkError::ReadLink { source, path: link }),
        };

        if replace {
            remove_file(&link).map_err(|source| LinkError::Unlink {
                source,
                path: link.clone(),
            })?;
        }

        info!("linking {} -> {}", link.display(), destination.display());
        symlink(destination, &link).map_err(|source| LinkError::Symlink {
            source,
            path: link.clone(),
        })?;

        if replace {
            changes.relinked.push(name.to_os_string());
        } else {
            changes.linked.push(name.to_os_string());
        }
    }

    Ok(changes)
}

/// Mark target as managed by symunion.
///
/// Creates the marker directory unless some entry by that name already
/// exists. Returns whether the marker had to be created.
///
/// # Errors
///
/// - Return [`LinkError::Marker`] if the marker cannot be created.
pub fn ensure_marker(target: &Path) -> Result<bool> {
    let marker = target.join(MARKER);
    if marker.symlink_metadata().is_ok() {
        return Ok(false);
    }

    debug!("creating marker {}", marker.display());
    create_dir(&marker).map_err(|source| LinkError::Marker {
        source,
        path: marker,
    })?;

    Ok(true)
}

/// Link synchronization error types.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Existing link cannot be read.
    #[error("failed to read link {:?}", path.display())]
    ReadLink {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Outdated link cannot be removed.
    #[error("failed to unlink {:?}", path.display())]
    Unlink {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Link cannot be created.
    #[error("failed to create link {:?}", path.display())]
    Symlink {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Marker cannot be created.
    #[error("failed to create marker {:?}", path.display())]
    Marker {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = LinkError> = std::result::Result<T, E>;
