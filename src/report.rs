//! End-of-run summary.

use std::fmt;
use std::time::Duration;

use indicatif::HumanBytes;

use crate::execute::ExecutionOutcome;
use crate::reconcile::ActionSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedLine {
    pub filename: String,
    pub url: String,
    pub reason: String,
}

/// What a run did (or, for a dry run, would do).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub dry_run: bool,
    pub removed: Vec<String>,
    pub renamed: Vec<(String, String)>,
    pub discarded: Vec<String>,
    pub installed: Vec<String>,
    pub failed: Vec<FailedLine>,
    pub skipped: Vec<String>,
    pub bytes_downloaded: u64,
    pub elapsed: Duration,
}

impl SyncReport {
    /// Report for a plan that was not executed.
    pub fn planned(actions: &ActionSet, elapsed: Duration) -> Self {
        Self {
            dry_run: true,
            removed: actions.to_remove.iter().map(|f| f.filename.clone()).collect(),
            renamed: actions
                .to_rename
                .iter()
                .map(|r| (r.local.filename.clone(), r.entry.filename.clone()))
                .collect(),
            installed: actions.to_install.iter().map(|e| e.filename.clone()).collect(),
            elapsed,
            ..Self::default()
        }
    }

    pub fn from_outcome(outcome: ExecutionOutcome, elapsed: Duration) -> Self {
        Self {
            dry_run: false,
            removed: outcome.removed,
            renamed: outcome.renamed,
            discarded: outcome.discarded,
            installed: outcome.installed.into_iter().map(|e| e.filename).collect(),
            failed: outcome
                .failed
                .into_iter()
                .map(|f| FailedLine {
                    reason: f.error.to_string(),
                    filename: f.entry.filename,
                    url: f.entry.source_url,
                })
                .collect(),
            skipped: outcome.skipped.into_iter().map(|e| e.filename).collect(),
            bytes_downloaded: outcome.bytes_downloaded,
            elapsed,
        }
    }

    /// True when nothing was (or would be) changed.
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
            && self.renamed.is_empty()
            && self.discarded.is_empty()
            && self.installed.is_empty()
            && self.failed.is_empty()
            && self.skipped.is_empty()
    }

    /// True when every scheduled install landed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

fn section<T>(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    items: &[T],
    line: impl Fn(&T) -> String,
) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(f, "{title} {} paks:", items.len())?;
    for item in items {
        writeln!(f, "{}", line(item))?;
    }
    writeln!(f)
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_noop() {
            return writeln!(f, "Everything is up to date.");
        }
        let (removed, renamed, installed) = if self.dry_run {
            ("Would remove", "Would rename", "Would install")
        } else {
            ("Removed", "Renamed", "Installed")
        };
        section(f, removed, &self.removed, |name| format!("- {name}"))?;
        section(f, renamed, &self.renamed, |(old, new)| format!("~ {old} -> {new}"))?;
        section(f, "Dropped duplicate", &self.discarded, |name| format!("x {name}"))?;
        section(f, installed, &self.installed, |name| format!("+ {name}"))?;
        section(f, "Failed to install", &self.failed, |l| {
            format!("! {} ({}): {}", l.filename, l.url, l.reason)
        })?;
        section(f, "Did not start", &self.skipped, |name| format!("? {name}"))?;

        if !self.dry_run {
            writeln!(
                f,
                "Downloaded {} in {}",
                HumanBytes(self.bytes_downloaded),
                format_duration(self.elapsed)
            )?;
        }
        Ok(())
    }
}

pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
