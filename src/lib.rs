// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Union view of several directory trees built from symbolic links.
//!
//! Symunion maintains a __target__ directory whose only contents are symbolic
//! links to the immediate subdirectories of one or more __source__
//! directories. The result looks like a union mount of every source, without
//! needing a union mount facility or copying a single file.
//!
//! Each run recomputes the desired set of links from scratch, refuses to
//! continue if two sources claim the same name, reaps broken links that can
//! be attributed to a current source, and brings the remaining links up to
//! date. The target is left read-only between runs so that nobody edits it
//! by accident.
//!
//! # See Also
//!
//! 1. [`merge`]
//! 2. [`config`]

pub mod config;
pub mod merge;
pub mod path;

pub use merge::{MergeError, SyncReport, UnionMerge, MARKER};
