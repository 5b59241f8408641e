use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::baseline::BaselineSet;
use crate::cli::Cli;
use crate::download::DownloadConfig;
use crate::retry::RetryConfig;
use crate::sync::SyncConfig;

/// Location of the package directory below a Ready Or Not install.
const PAKS_SUBDIR: [&str; 3] = ["ReadyOrNot", "Content", "Paks"];

/// Application configuration, resolved from CLI flags and environment.
#[derive(Debug)]
pub struct Config {
    pub sync: SyncConfig,
    pub download: DownloadConfig,
    pub no_progress_bar: bool,
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// `<ron_path>/ReadyOrNot/Content/Paks`
pub fn package_directory(ron_path: &Path) -> PathBuf {
    PAKS_SUBDIR.iter().fold(ron_path.to_path_buf(), |p, part| p.join(part))
}

fn default_hash_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Config {
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let directory = match (cli.directory.as_deref(), cli.ron_path.as_deref()) {
            (Some(dir), _) => expand_tilde(dir),
            (None, Some(ron)) => package_directory(&expand_tilde(ron)),
            (None, None) => anyhow::bail!("Either --ron-path or --directory must be set"),
        };

        let url = reqwest::Url::parse(&cli.manifest_url)
            .map_err(|e| anyhow::anyhow!("Invalid manifest URL '{}': {e}", cli.manifest_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!(
                "Manifest URL must use http or https, got '{}'",
                url.scheme()
            );
        }

        let retry_delay = Duration::from_secs(cli.retry_delay);
        let retry = RetryConfig {
            max_retries: cli.max_retries,
            base_delay: retry_delay,
            max_delay: RetryConfig::default().max_delay.max(retry_delay),
        };

        Ok(Self {
            sync: SyncConfig {
                directory,
                include_optional: cli.sync_maps,
                manifest_url: cli.manifest_url,
                baseline: BaselineSet::with_extras(cli.excludes),
                hash_concurrency: cli
                    .hash_concurrency
                    .map(usize::from)
                    .unwrap_or_else(default_hash_concurrency),
                dry_run: cli.dry_run,
            },
            download: DownloadConfig {
                timeout: Duration::from_secs(cli.timeout_secs),
                retry,
                concurrent_downloads: usize::from(cli.concurrent_downloads),
            },
            no_progress_bar: cli.no_progress_bar,
        })
    }
}
