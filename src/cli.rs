use clap::Parser;

use crate::manifest::DEFAULT_MANIFEST_URL;
use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "paksync",
    version,
    about = "Sync Ready Or Not pak files against a remote manifest"
)]
pub struct Cli {
    /// Ready Or Not install directory; paks live in ReadyOrNot/Content/Paks below it
    #[arg(long, env = "RON_PATH", required_unless_present = "directory")]
    pub ron_path: Option<String>,

    /// Package directory to sync directly (overrides --ron-path)
    #[arg(short = 'd', long, env = "PAKSYNC_DIRECTORY")]
    pub directory: Option<String>,

    /// Also install map packages
    #[arg(long, env = "SYNC_MAPS")]
    pub sync_maps: bool,

    /// Manifest location
    #[arg(long, env = "PAKSYNC_MANIFEST_URL", default_value = DEFAULT_MANIFEST_URL)]
    pub manifest_url: String,

    /// Extra filename to leave alone, in addition to the stock game paks
    #[arg(long = "exclude")]
    pub excludes: Vec<String>,

    /// Number of local files hashed in parallel (default: available cores)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub hash_concurrency: Option<u16>,

    /// Number of concurrent downloads
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrent_downloads: u16,

    /// Seconds without connection progress or received bytes before a download fails
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Retries per download after a transient failure
    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,

    /// Base delay in seconds between retries
    #[arg(long, default_value_t = 5)]
    pub retry_delay: u64,

    /// Print what would change without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress_bar: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}
