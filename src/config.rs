// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for configuration files that symunion uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Merge configuration layout.
///
/// A configuration file is a listing of __merge definitions__. Each merge
/// definition describes one target directory, and the source directories
/// whose immediate subdirectories should be linked into it.
///
/// # General Layout
///
/// ```toml
/// [[merge]]
/// target = "~/media"
/// sources = ["/mnt/disk1/media", "$DATA/media"]
/// ignore = [".dropbox.cache"]
/// ```
///
/// Merges are performed in the order they are listed.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct MergeConfig {
    /// Listing of merges to perform.
    #[serde(rename = "merge", default)]
    pub merges: Vec<MergeDefinition>,
}

impl FromStr for MergeConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: MergeConfig = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        for definition in &mut config.merges {
            definition.target = definition.target.expand()?;
            definition.sources = definition
                .sources
                .iter()
                .map(MergePath::expand)
                .collect::<Result<Vec<_>>>()?;
        }

        Ok(config)
    }
}

impl Display for MergeConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Single merge definition.
///
/// One target directory fed by one or more source directories.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct MergeDefinition {
    /// Directory that will hold the symbolic links.
    pub target: MergePath,

    /// Directories whose immediate subdirectories get linked into target.
    pub sources: Vec<MergePath>,

    /// Glob patterns of subdirectory names to leave out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<Vec<String>>,
}

/// Path to a directory involved in a merge.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct MergePath(PathBuf);

impl MergePath {
    /// Construct new merge path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Treat merge path as [`Path`] slice.
    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }

    /// Perform shell expansion, e.g., `~` and `$VAR`, on merge path.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if a variable cannot be
    ///   looked up.
    pub fn expand(&self) -> Result<Self> {
        Ok(Self::new(
            shellexpand::full(self.to_string().as_str())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned(),
        ))
    }
}

impl Display for MergePath {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_path().to_string_lossy().as_ref())
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("BLAH", "/home/blah"), ("HOME", "/home/blah")])]
    fn deserialize_merge_config() -> anyhow::Result<()> {
        let result: MergeConfig = r#"
            [[merge]]
            target = "~/media"
            sources = ["/mnt/disk1/media", "$BLAH/media"]
            ignore = [".dropbox.cache", "*.tmp"]

            [[merge]]
            target = "/srv/books"
            sources = ["/mnt/disk1/books"]
        "#
        .parse()?;

        let expect = MergeConfig {
            merges: vec![
                MergeDefinition {
                    target: MergePath::new("/home/blah/media"),
                    sources: vec![
                        MergePath::new("/mnt/disk1/media"),
                        MergePath::new("/home/blah/media"),
                    ],
                    ignore: Some(vec![".dropbox.cache".into(), "*.tmp".into()]),
                },
                MergeDefinition {
                    target: MergePath::new("/srv/books"),
                    sources: vec![MergePath::new("/mnt/disk1/books")],
                    ignore: None,
                },
            ],
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn deserialize_rejects_unknown_variable() {
        let result = r#"
            [[merge]]
            target = "$NO_SUCH_SYMUNION_VAR/media"
            sources = ["/mnt/disk1/media"]
        "#
        .parse::<MergeConfig>();

        assert!(matches!(result, Err(ConfigError::ShellExpansion(_))));
    }

    #[test]
    fn deserialize_empty_config() -> anyhow::Result<()> {
        let result: MergeConfig = "".parse()?;
        assert_eq!(result, MergeConfig::default());

        Ok(())
    }

    #[test]
    fn serialized_config_parses_back() -> anyhow::Result<()> {
        let config = MergeConfig {
            merges: vec![MergeDefinition {
                target: MergePath::new("/srv/union"),
                sources: vec![MergePath::new("/mnt/a"), MergePath::new("/mnt/b")],
                ignore: Some(vec![".dropbox.cache".into()]),
            }],
        };

        let rendered = config.to_string();
        assert!(rendered.contains("[[merge]]"));
        assert_eq!(rendered.parse::<MergeConfig>()?, config);

        Ok(())
    }
}
