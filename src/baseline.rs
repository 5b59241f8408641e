//! Packages that ship with the game and must never be touched by a sync.

use std::collections::HashSet;

/// Stock content packages in `ReadyOrNot/Content/Paks`. Matching is exact,
/// the same way the game names them on disk.
pub const DEFAULT_BASELINE_PAKS: &[&str] = &[
    "pakchunk0-Windows.pak",
    "pakchunk1-Windows.pak",
    "pakchunk2-Windows.pak",
    "pakchunk3-Windows.pak",
    "pakchunk4-Windows.pak",
    "pakchunk5-Windows.pak",
    "pakchunk6-Windows.pak",
    "pakchunk7-Windows.pak",
    "pakchunk8-Windows.pak",
    "pakchunk9-Windows.pak",
    "pakchunk10-Windows.pak",
    "pakchunk0-WindowsNoEditor.pak",
    "pakchunk1-WindowsNoEditor.pak",
    "pakchunk2-WindowsNoEditor.pak",
    "pakchunk3-WindowsNoEditor.pak",
    "pakchunk4-WindowsNoEditor.pak",
    "pakchunk5-WindowsNoEditor.pak",
    "pakchunk6-WindowsNoEditor.pak",
    "pakchunk7-WindowsNoEditor.pak",
    "pakchunk8-WindowsNoEditor.pak",
    "pakchunk9-WindowsNoEditor.pak",
    "pakchunk10-WindowsNoEditor.pak",
];

/// Filenames the scanner skips.
#[derive(Debug, Clone)]
pub struct BaselineSet {
    names: HashSet<String>,
}

impl BaselineSet {
    /// The stock list plus any user-supplied extras.
    pub fn with_extras<I, S>(extras: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: HashSet<String> =
            DEFAULT_BASELINE_PAKS.iter().map(|s| s.to_string()).collect();
        names.extend(extras.into_iter().map(Into::into));
        Self { names }
    }

    /// No exclusions at all.
    pub fn empty() -> Self {
        Self {
            names: HashSet::new(),
        }
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.names.contains(filename)
    }
}

impl Default for BaselineSet {
    fn default() -> Self {
        Self::with_extras(std::iter::empty::<String>())
    }
}
