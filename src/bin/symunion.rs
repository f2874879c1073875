// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use symunion::{
    config::MergeConfig,
    path::default_config_path,
    SyncReport, UnionMerge,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::{fs::read_to_string, path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Merge subdirectories of several sources into one directory of symlinks.
#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  symunion [options] --to <target> <source>...\n  symunion [options] [--config <path>]",
    version
)]
struct Cli {
    /// Target directory to populate with symbolic links.
    #[arg(short, long, value_name = "target", requires = "sources")]
    pub to: Option<PathBuf>,

    /// Glob of subdirectory names to ignore, e.g., ".dropbox.cache".
    #[arg(short, long, value_name = "glob")]
    pub ignore: Vec<String>,

    /// Configuration file listing merges to perform.
    #[arg(short, long, value_name = "path", conflicts_with = "to")]
    pub config: Option<PathBuf>,

    /// Source directories whose subdirectories get linked into target.
    #[arg(value_name = "source", requires = "to")]
    pub sources: Vec<PathBuf>,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.to {
            Some(target) => run_merge(target, self.sources, self.ignore),
            None => run_config(self.config, self.ignore),
        }
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_merge(target: PathBuf, sources: Vec<PathBuf>, ignore: Vec<String>) -> Result<()> {
    let merge = UnionMerge::new(target, sources, ignore)?;
    let report = merge.run()?;
    log_report(&merge, &report);

    Ok(())
}

fn run_config(path: Option<PathBuf>, ignore: Vec<String>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    let config: MergeConfig = read_to_string(&path)
        .with_context(|| format!("failed to read configuration file {:?}", path.display()))?
        .parse()
        .with_context(|| format!("failed to parse configuration file {:?}", path.display()))?;

    if config.merges.is_empty() {
        bail!("no merges defined in {:?}", path.display());
    }

    for mut definition in config.merges {
        definition
            .ignore
            .get_or_insert_with(Vec::new)
            .extend(ignore.iter().cloned());

        let merge = UnionMerge::from_definition(&definition)
            .with_context(|| format!("invalid merge into {:?}", definition.target.to_string()))?;
        let report = merge.run()?;
        log_report(&merge, &report);
    }

    Ok(())
}

fn log_report(merge: &UnionMerge, report: &SyncReport) {
    if report.is_noop() {
        info!("{} already up to date", merge.target().display());
        return;
    }

    info!(
        "{}: {} linked, {} relinked, {} unchanged, {} reaped, {} kept broken",
        merge.target().display(),
        report.linked.len(),
        report.relinked.len(),
        report.unchanged.len(),
        report.reaped.len(),
        report.kept.len(),
    );
}
