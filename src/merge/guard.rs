// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Scoped write access to target.
//!
//! Target is kept read-only for everyone between runs, so that manual edits
//! are refused by the operating system. A run grants the owner write access
//! for as long as it holds a [`WriteGuard`], and takes it away again once
//! the guard is released or dropped. The grant is advisory, and does not
//! stop another process that is already able to write into target.

use std::{
    fs::{metadata, set_permissions, Permissions},
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};
use tracing::{debug, error};

const OWNER_WRITE: u32 = 0o200;
const ALL_WRITE: u32 = 0o222;

/// Temporary owner write access to a directory.
///
/// # Invariant
///
/// - Write access for all classes is removed on every exit path, be it
///   [`WriteGuard::release`], an early return, or a panic.
#[derive(Debug)]
pub struct WriteGuard {
    path: PathBuf,
    released: bool,
}

impl WriteGuard {
    /// Grant owner write access to directory, i.e., `chmod u+w`.
    ///
    /// # Errors
    ///
    /// - Return [`PermissionError::Grant`] if permissions cannot be changed.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        debug!("grant write access to {}", path.display());
        change_mode(&path, |mode| mode | OWNER_WRITE)
            .map_err(|source| PermissionError::Grant {
                source,
                path: path.clone(),
            })?;

        Ok(Self {
            path,
            released: false,
        })
    }

    /// Take write access away from every class, i.e., `chmod ugo-w`.
    ///
    /// # Errors
    ///
    /// - Return [`PermissionError::Revoke`] if permissions cannot be changed.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        revoke(&self.path)
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if let Err(err) = revoke(&self.path) {
            error!("{err:?}");
        }
    }
}

fn revoke(path: &Path) -> Result<()> {
    debug!("revoke write access to {}", path.display());
    change_mode(path, |mode| mode & !ALL_WRITE).map_err(|source| PermissionError::Revoke {
        source,
        path: path.to_path_buf(),
    })
}

fn change_mode(path: &Path, edit: impl FnOnce(u32) -> u32) -> std::io::Result<()> {
    let mode = metadata(path)?.permissions().mode();
    set_permissions(path, Permissions::from_mode(edit(mode)))
}

/// Permission change error types.
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    /// Write access cannot be granted.
    #[error("failed to grant write access to {:?}", path.display())]
    Grant {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Write access cannot be taken away.
    #[error("failed to revoke write access to {:?}", path.display())]
    Revoke {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = PermissionError> = std::result::Result<T, E>;
