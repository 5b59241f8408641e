//! Progress observation for a sync run.
//!
//! The core calls into a [`SyncObserver`] and never draws anything itself.
//! [`TerminalObserver`] renders with indicatif; [`SilentObserver`] discards
//! everything and is what tests use.

use std::collections::HashMap;
use std::io::IsTerminal;
use std::sync::{Mutex, PoisonError};

use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::download::error::DownloadError;

/// Count-based phases of a run. Installs report bytes instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Hash,
    Remove,
    Rename,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Hash => "Hashing pak files",
            Phase::Remove => "Removing old paks",
            Phase::Rename => "Renaming paks",
        }
    }
}

/// A snapshot of one transfer. `total` is 0 when the server sent no
/// `content-length`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferProgress {
    pub loaded: u64,
    pub total: u64,
    pub bytes_per_sec: f64,
}

/// Callbacks the core emits while it works. Every method has a no-op
/// default so observers only implement what they render.
pub trait SyncObserver: Send + Sync {
    fn phase_started(&self, _phase: Phase, _total: u64) {}

    fn item_completed(&self, _phase: Phase, _name: &str) {}

    fn phase_finished(&self, _phase: Phase) {}

    /// `index` is 1-based.
    fn install_started(&self, _filename: &str, _index: usize, _count: usize) {}

    fn install_progress(&self, _filename: &str, _progress: TransferProgress) {}

    fn install_finished(&self, _filename: &str, _outcome: Result<(), &DownloadError>) {}

    /// Run `f` with any live rendering hidden, so log lines are not torn
    /// apart by a redraw.
    fn suspend(&self, f: &mut dyn FnMut()) {
        f()
    }
}

#[derive(Debug, Default)]
pub struct SilentObserver;

impl SyncObserver for SilentObserver {}

/// indicatif-backed observer: a spinner for count phases and one byte bar
/// per in-flight download.
pub struct TerminalObserver {
    multi: MultiProgress,
    phase_bar: Mutex<Option<ProgressBar>>,
    installs: Mutex<HashMap<String, ProgressBar>>,
}

impl TerminalObserver {
    /// Rendering is disabled when the user asked for it or stdout is not a
    /// TTY (piped output, scheduled tasks).
    pub fn new(no_progress_bar: bool) -> Self {
        let multi = if no_progress_bar || !std::io::stdout().is_terminal() {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };
        Self {
            multi,
            phase_bar: Mutex::new(None),
            installs: Mutex::new(HashMap::new()),
        }
    }

    fn count_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }

    fn bytes_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{bar:30.cyan/blue}] {bytes}/{total_bytes} {msg} (ETA {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
    }

    fn unknown_length_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {bytes} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

impl SyncObserver for TerminalObserver {
    fn phase_started(&self, phase: Phase, total: u64) {
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(Self::count_style());
        pb.set_message(phase.label());
        let mut slot = self.phase_bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = slot.replace(pb) {
            old.finish_and_clear();
        }
    }

    fn item_completed(&self, _phase: Phase, _name: &str) {
        let slot = self.phase_bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pb) = slot.as_ref() {
            pb.inc(1);
        }
    }

    fn phase_finished(&self, _phase: Phase) {
        let mut slot = self.phase_bar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pb) = slot.take() {
            pb.finish_and_clear();
        }
    }

    fn install_started(&self, filename: &str, index: usize, count: usize) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::unknown_length_style());
        pb.set_message(format!("{filename} ({index} of {count})"));
        self.installs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(filename.to_string(), pb);
    }

    fn install_progress(&self, filename: &str, progress: TransferProgress) {
        let installs = self.installs.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(pb) = installs.get(filename) else {
            return;
        };
        if progress.total > 0 && pb.length() != Some(progress.total) {
            pb.set_length(progress.total);
            pb.set_style(Self::bytes_style());
        }
        pb.set_position(progress.loaded);
        pb.set_message(format!(
            "{filename} | {}/s",
            HumanBytes(progress.bytes_per_sec as u64)
        ));
    }

    fn install_finished(&self, filename: &str, outcome: Result<(), &DownloadError>) {
        let pb = self
            .installs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(filename);
        if let Some(pb) = pb {
            match outcome {
                Ok(()) => pb.finish_and_clear(),
                Err(e) => pb.abandon_with_message(format!("{filename} [FAILED: {e}]")),
            }
        }
    }

    fn suspend(&self, f: &mut dyn FnMut()) {
        self.multi.suspend(f)
    }
}
