// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Name clash detection.
//!
//! Every candidate from every source root is merged into one
//! __desired mapping__ of link name to source path. Two different source
//! paths claiming the same name is a __clash__. Clashes are never settled by
//! the order that source roots were given in. Instead, all of them are
//! collected and reported together, and the merge is aborted before the
//! target is touched.

use crate::merge::source::Candidate;

use std::{
    collections::{btree_map::Entry, BTreeMap},
    ffi::{OsStr, OsString},
    fmt::Write,
    path::{Path, PathBuf},
};
use tracing::warn;

/// Table of link name to source path that target should mirror.
///
/// # Invariant
///
/// - Each name maps to exactly one source path.
/// - Iteration happens in name order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DesiredMapping {
    links: BTreeMap<OsString, PathBuf>,
}

impl DesiredMapping {
    /// Build desired mapping from candidates.
    ///
    /// Candidates are inserted in the order given. The same name with the
    /// same path, e.g., a source root listed twice, is not a clash.
    ///
    /// # Errors
    ///
    /// - Return [`ClashError`] listing every clash if any name is claimed by
    ///   more than one source path.
    pub fn build(candidates: impl IntoIterator<Item = Candidate>) -> Result<Self> {
        let mut links = BTreeMap::new();
        let mut clashes = Vec::new();

        for Candidate { name, path } in candidates {
            match links.entry(name) {
                Entry::Vacant(entry) => {
                    entry.insert(path);
                }
                Entry::Occupied(entry) if *entry.get() == path => continue,
                Entry::Occupied(entry) => {
                    warn!(
                        "clashing path: {}, {}",
                        entry.get().display(),
                        path.display()
                    );
                    clashes.push(Clash {
                        name: entry.key().clone(),
                        first: entry.get().clone(),
                        second: path,
                    });
                }
            }
        }

        if !clashes.is_empty() {
            return Err(ClashError { clashes });
        }

        Ok(Self { links })
    }

    /// Source path that a link name should point to.
    pub fn get(&self, name: impl AsRef<OsStr>) -> Option<&Path> {
        self.links.get(name.as_ref()).map(PathBuf::as_path)
    }

    /// Iterate through link names and source paths in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &Path)> {
        self.links
            .iter()
            .map(|(name, path)| (name.as_os_str(), path.as_path()))
    }

    /// Number of links in mapping.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Check if mapping holds no links at all.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Two source paths claiming one link name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clash {
    /// Link name in dispute.
    pub name: OsString,

    /// Source path that claimed the name first.
    pub first: PathBuf,

    /// Source path that claimed the name afterwards.
    pub second: PathBuf,
}

/// One or more names are claimed by different source paths.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("clashing names detected:{}", list_clashes(.clashes))]
pub struct ClashError {
    /// All clashes found.
    pub clashes: Vec<Clash>,
}

fn list_clashes(clashes: &[Clash]) -> String {
    let mut out = String::new();
    for clash in clashes {
        let _ = write!(
            out,
            "\n  {}: {}, {}",
            clash.name.to_string_lossy(),
            clash.first.display(),
            clash.second.display()
        );
    }

    out
}

/// Friendly result alias :3
pub type Result<T, E = ClashError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn candidate(root: &str, name: &str) -> Candidate {
        Candidate {
            name: name.into(),
            path: PathBuf::from(root).join(name),
        }
    }

    #[test]
    fn build_merges_disjoint_sources() -> anyhow::Result<()> {
        let mapping = DesiredMapping::build([
            candidate("/c1", "bbb"),
            candidate("/c1", "aaa"),
            candidate("/c3", "zzz"),
        ])?;

        let result = mapping.iter().collect::<Vec<_>>();
        let expect = vec![
            (OsStr::new("aaa"), Path::new("/c1/aaa")),
            (OsStr::new("bbb"), Path::new("/c1/bbb")),
            (OsStr::new("zzz"), Path::new("/c3/zzz")),
        ];
        assert_eq!(result, expect);
        assert_eq!(mapping.get("zzz"), Some(Path::new("/c3/zzz")));
        assert_eq!(mapping.get("ccc"), None);

        Ok(())
    }

    #[test]
    fn build_tolerates_repeated_source() -> anyhow::Result<()> {
        let mapping = DesiredMapping::build([
            candidate("/c1", "aaa"),
            candidate("/c1", "aaa"),
        ])?;
        assert_eq!(mapping.len(), 1);

        Ok(())
    }

    #[test]
    fn build_from_nothing_is_empty() -> anyhow::Result<()> {
        let mapping = DesiredMapping::build([])?;
        assert!(mapping.is_empty());
        assert_eq!(mapping.len(), 0);

        Ok(())
    }

    #[test]
    fn build_keeps_names_apart_byte_for_byte() -> anyhow::Result<()> {
        use std::os::unix::ffi::OsStrExt;

        let first = OsStr::from_bytes(b"a\xff");
        let second = OsStr::from_bytes(b"a\xfe");
        let mapping = DesiredMapping::build([
            Candidate {
                name: first.into(),
                path: Path::new("/c1").join(first),
            },
            Candidate {
                name: second.into(),
                path: Path::new("/c2").join(second),
            },
        ])?;

        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get(first), Some(Path::new("/c1").join(first).as_path()));
        assert_eq!(mapping.get(second), Some(Path::new("/c2").join(second).as_path()));

        Ok(())
    }

    #[test]
    fn build_reports_every_clash() {
        let result = DesiredMapping::build([
            candidate("/c1", "aaa"),
            candidate("/c1", "bbb"),
            candidate("/c2", "aaa"),
            candidate("/c2", "ccc"),
            candidate("/c3", "bbb"),
        ]);

        let expect = ClashError {
            clashes: vec![
                Clash {
                    name: "aaa".into(),
                    first: "/c1/aaa".into(),
                    second: "/c2/aaa".into(),
                },
                Clash {
                    name: "bbb".into(),
                    first: "/c1/bbb".into(),
                    second: "/c3/bbb".into(),
                },
            ],
        };
        assert_eq!(result, Err(expect));
    }

    #[test]
    fn build_fails_regardless_of_source_order() {
        let forward = DesiredMapping::build([candidate("/c1", "aaa"), candidate("/c2", "aaa")]);
        let backward = DesiredMapping::build([candidate("/c2", "aaa"), candidate("/c1", "aaa")]);
        assert!(forward.is_err());
        assert!(backward.is_err());
    }

    #[test]
    fn clash_error_lists_both_paths() {
        let error = ClashError {
            clashes: vec![Clash {
                name: "aaa".into(),
                first: "/c1/aaa".into(),
                second: "/c2/aaa".into(),
            }],
        };

        let expect = indoc! {r#"
            clashing names detected:
              aaa: /c1/aaa, /c2/aaa"#};
        assert_eq!(error.to_string(), expect);
    }
}
