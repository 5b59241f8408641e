//! The diff engine: local inventory + manifest -> remove/rename/install.
//!
//! Everything here is pure. Content digest is the identity of a package;
//! filenames only matter once the digest has matched.

use std::collections::{HashMap, HashSet};

use crate::manifest::ManifestEntry;
use crate::scan::LocalFile;

/// Suffix for the temporary name used to break rename cycles.
pub const RENAME_STAGING_SUFFIX: &str = ".paksync-rename";

/// A local file whose content is wanted under a different name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub local: LocalFile,
    pub entry: ManifestEntry,
}

/// Output of [`reconcile`]. A local file appears in at most one of
/// `to_remove`/`to_rename`; a manifest entry in at most one of
/// `to_rename`/`to_install`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSet {
    pub to_remove: Vec<LocalFile>,
    pub to_rename: Vec<Rename>,
    pub to_install: Vec<ManifestEntry>,
}

impl ActionSet {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_rename.is_empty() && self.to_install.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_remove.len() + self.to_rename.len() + self.to_install.len()
    }
}

/// Compute the actions that bring `local` in line with `manifest`.
///
/// - remove: local files whose digest is not in the manifest
/// - rename: local files whose digest is in the manifest under another name
/// - install: manifest entries whose digest is not present locally, minus
///   map assets unless `include_optional`
///
/// When the manifest lists one digest several times, the first entry is the
/// one matched against and the only one installed. Entries that share a
/// filename but not a digest are evaluated independently.
pub fn reconcile(
    local: &[LocalFile],
    manifest: &[ManifestEntry],
    include_optional: bool,
) -> ActionSet {
    let mut by_digest: HashMap<&str, &ManifestEntry> = HashMap::with_capacity(manifest.len());
    for entry in manifest {
        by_digest.entry(entry.digest.as_str()).or_insert(entry);
    }
    let local_digests: HashSet<&str> = local.iter().map(|f| f.digest.as_str()).collect();

    let mut actions = ActionSet::default();
    for file in local {
        match by_digest.get(file.digest.as_str()) {
            None => actions.to_remove.push(file.clone()),
            Some(entry) if entry.filename != file.filename => actions.to_rename.push(Rename {
                local: file.clone(),
                entry: (*entry).clone(),
            }),
            Some(_) => {}
        }
    }

    let mut scheduled: HashSet<&str> = HashSet::new();
    for entry in manifest {
        if local_digests.contains(entry.digest.as_str()) {
            continue;
        }
        if entry.is_map_asset && !include_optional {
            continue;
        }
        if scheduled.insert(entry.digest.as_str()) {
            actions.to_install.push(entry.clone());
        }
    }

    actions
}

/// One filesystem step of the rename phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameStep {
    /// Move `from` to `to` within the package directory.
    Move { from: String, to: String },
    /// `name` holds content that already sits (or will sit) at `kept`;
    /// delete it instead of moving it over.
    Discard { name: String, kept: String },
}

/// Order the renames of `actions` so that none clobbers a file another
/// rename still has to move, breaking cycles through a staging name.
///
/// A rename whose content is already present at the destination (a
/// correctly named local copy, or an earlier rename of the same digest)
/// becomes a [`RenameStep::Discard`].
pub fn plan_renames(local: &[LocalFile], actions: &ActionSet) -> Vec<RenameStep> {
    let leaving: HashSet<&str> = actions
        .to_remove
        .iter()
        .map(|f| f.filename.as_str())
        .chain(actions.to_rename.iter().map(|r| r.local.filename.as_str()))
        .collect();

    // Destination name -> digest that will end up there.
    let mut claimed: HashMap<&str, &str> = local
        .iter()
        .filter(|f| !leaving.contains(f.filename.as_str()))
        .map(|f| (f.filename.as_str(), f.digest.as_str()))
        .collect();

    let mut steps = Vec::new();
    let mut moves: Vec<(String, String)> = Vec::new();
    for rename in &actions.to_rename {
        let to = rename.entry.filename.as_str();
        let digest = rename.local.digest.as_str();
        if claimed.get(to) == Some(&digest) {
            steps.push(RenameStep::Discard {
                name: rename.local.filename.clone(),
                kept: to.to_string(),
            });
            continue;
        }
        claimed.insert(to, digest);
        moves.push((rename.local.filename.clone(), to.to_string()));
    }

    // Discards run first: they only delete, and free their names.
    while !moves.is_empty() {
        let ready = moves
            .iter()
            .position(|(_, to)| !moves.iter().any(|(from, _)| from == to));
        match ready {
            Some(i) => {
                let (from, to) = moves.remove(i);
                steps.push(RenameStep::Move { from, to });
            }
            None => {
                // Every destination is still some pending source: a cycle.
                let (from, to) = moves.remove(0);
                let staged = format!("{from}{RENAME_STAGING_SUFFIX}");
                steps.push(RenameStep::Move {
                    from,
                    to: staged.clone(),
                });
                moves.push((staged, to));
            }
        }
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u8) -> String {
        format!("{:064x}", n)
    }

    fn local(name: &str, digest: u8) -> LocalFile {
        LocalFile::new(name, h(digest))
    }

    fn entry(digest: u8, name: &str) -> ManifestEntry {
        ManifestEntry::new(h(digest), name, format!("https://x/download?path=%2Fmods%2F&files={name}"))
    }

    fn map_entry(digest: u8, name: &str) -> ManifestEntry {
        ManifestEntry::new(h(digest), name, format!("https://x/download?path=%2Fmaps%2F&files={name}"))
    }

    /// Apply a step list to an in-memory directory.
    fn apply(dir: &mut HashMap<String, String>, steps: &[RenameStep]) {
        for step in steps {
            match step {
                RenameStep::Move { from, to } => {
                    let content = dir.remove(from).expect("move source exists");
                    dir.insert(to.clone(), content);
                }
                RenameStep::Discard { name, kept } => {
                    let content = dir.remove(name).expect("discard source exists");
                    assert_eq!(dir.get(kept), Some(&content), "discarded unique content");
                }
            }
        }
    }

    #[test]
    fn test_in_sync_is_empty() {
        let actions = reconcile(&[local("a.pak", 1)], &[entry(1, "a.pak")], true);
        assert!(actions.is_empty());
        assert_eq!(actions.len(), 0);
    }

    #[test]
    fn test_misnamed_file_is_renamed() {
        let actions = reconcile(&[local("old.pak", 1)], &[entry(1, "new.pak")], true);
        assert_eq!(actions.to_rename.len(), 1);
        assert_eq!(actions.to_rename[0].local.filename, "old.pak");
        assert_eq!(actions.to_rename[0].entry.filename, "new.pak");
        assert!(actions.to_remove.is_empty());
        assert!(actions.to_install.is_empty());
    }

    #[test]
    fn test_orphan_is_removed() {
        let actions = reconcile(&[local("stale.pak", 9)], &[], true);
        assert_eq!(actions.to_remove, vec![local("stale.pak", 9)]);
        assert!(actions.to_rename.is_empty());
        assert!(actions.to_install.is_empty());
    }

    #[test]
    fn test_missing_entry_is_installed() {
        let actions = reconcile(&[], &[entry(2, "b.pak")], true);
        assert_eq!(actions.to_install, vec![entry(2, "b.pak")]);
    }

    #[test]
    fn test_digest_wins_over_name() {
        // Same name, different content: remove + install, not a rename.
        let actions = reconcile(&[local("a.pak", 1)], &[entry(2, "a.pak")], true);
        assert_eq!(actions.to_remove, vec![local("a.pak", 1)]);
        assert_eq!(actions.to_install, vec![entry(2, "a.pak")]);
        assert!(actions.to_rename.is_empty());
    }

    #[test]
    fn test_renamed_content_never_reinstalled() {
        let actions = reconcile(&[local("x.pak", 3)], &[entry(3, "y.pak")], true);
        assert!(actions.to_install.is_empty());
        assert!(actions.to_remove.is_empty());
    }

    #[test]
    fn test_maps_filtered_unless_included() {
        let manifest = [entry(1, "mod.pak"), map_entry(2, "map.pak")];
        let without = reconcile(&[], &manifest, false);
        assert_eq!(without.to_install, vec![entry(1, "mod.pak")]);
        let with = reconcile(&[], &manifest, true);
        assert_eq!(with.to_install.len(), 2);
    }

    #[test]
    fn test_present_map_is_kept_when_excluded() {
        // Excluding maps only affects installs; an installed map stays.
        let actions = reconcile(&[local("map.pak", 2)], &[map_entry(2, "map.pak")], false);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_duplicate_digest_in_manifest_installs_once() {
        let manifest = [entry(1, "first.pak"), entry(1, "second.pak")];
        let actions = reconcile(&[], &manifest, true);
        assert_eq!(actions.to_install, vec![entry(1, "first.pak")]);

        let actions = reconcile(&[local("second.pak", 1)], &manifest, true);
        assert_eq!(actions.to_rename.len(), 1);
        assert_eq!(actions.to_rename[0].entry.filename, "first.pak");
    }

    #[test]
    fn test_same_filename_different_digests_both_evaluated() {
        let manifest = [entry(1, "dup.pak"), entry(2, "dup.pak")];
        let actions = reconcile(&[], &manifest, true);
        assert_eq!(actions.to_install.len(), 2);
    }

    #[test]
    fn test_reconcile_is_deterministic() {
        let local_files = [local("a.pak", 1), local("b.pak", 5), local("c.pak", 3)];
        let manifest = [entry(1, "a2.pak"), entry(3, "c.pak"), entry(4, "d.pak")];
        let first = reconcile(&local_files, &manifest, false);
        let second = reconcile(&local_files, &manifest, false);
        assert_eq!(first, second);
    }

    #[test]
    fn test_disjointness_on_mixed_input() {
        let local_files = [
            local("keep.pak", 1),
            local("wrong-name.pak", 2),
            local("orphan.pak", 3),
            local("copy.pak", 2),
        ];
        let manifest = [
            entry(1, "keep.pak"),
            entry(2, "right-name.pak"),
            entry(4, "new.pak"),
            map_entry(5, "map.pak"),
        ];
        let actions = reconcile(&local_files, &manifest, false);

        let removed: HashSet<_> = actions.to_remove.iter().map(|f| &f.filename).collect();
        let renamed: HashSet<_> = actions.to_rename.iter().map(|r| &r.local.filename).collect();
        assert!(removed.is_disjoint(&renamed));

        let rename_targets: HashSet<_> = actions.to_rename.iter().map(|r| &r.entry.digest).collect();
        let installs: HashSet<_> = actions.to_install.iter().map(|e| &e.digest).collect();
        assert!(rename_targets.is_disjoint(&installs));

        assert_eq!(removed.len(), 1);
        assert_eq!(renamed.len(), 2);
        assert_eq!(actions.to_install, vec![entry(4, "new.pak")]);
    }

    #[test]
    fn test_plan_simple_rename() {
        let local_files = [local("old.pak", 1)];
        let actions = reconcile(&local_files, &[entry(1, "new.pak")], true);
        assert_eq!(
            plan_renames(&local_files, &actions),
            vec![RenameStep::Move {
                from: "old.pak".into(),
                to: "new.pak".into()
            }]
        );
    }

    #[test]
    fn test_plan_orders_chain() {
        // a -> b while b -> c: b must move out first.
        let local_files = [local("a.pak", 1), local("b.pak", 2)];
        let actions = reconcile(&local_files, &[entry(1, "b.pak"), entry(2, "c.pak")], true);
        let steps = plan_renames(&local_files, &actions);
        assert_eq!(
            steps,
            vec![
                RenameStep::Move {
                    from: "b.pak".into(),
                    to: "c.pak".into()
                },
                RenameStep::Move {
                    from: "a.pak".into(),
                    to: "b.pak".into()
                },
            ]
        );
    }

    #[test]
    fn test_plan_breaks_swap_cycle() {
        let local_files = [local("a.pak", 1), local("b.pak", 2)];
        let actions = reconcile(&local_files, &[entry(1, "b.pak"), entry(2, "a.pak")], true);
        let steps = plan_renames(&local_files, &actions);
        assert_eq!(steps.len(), 3);

        let mut dir: HashMap<String, String> =
            local_files.iter().map(|f| (f.filename.clone(), f.digest.clone())).collect();
        apply(&mut dir, &steps);
        assert_eq!(dir.len(), 2);
        assert_eq!(dir["a.pak"], h(2));
        assert_eq!(dir["b.pak"], h(1));
    }

    #[test]
    fn test_plan_breaks_three_cycle() {
        let local_files = [local("a.pak", 1), local("b.pak", 2), local("c.pak", 3)];
        let manifest = [entry(1, "b.pak"), entry(2, "c.pak"), entry(3, "a.pak")];
        let actions = reconcile(&local_files, &manifest, true);
        let steps = plan_renames(&local_files, &actions);

        let mut dir: HashMap<String, String> =
            local_files.iter().map(|f| (f.filename.clone(), f.digest.clone())).collect();
        apply(&mut dir, &steps);
        assert_eq!(dir["b.pak"], h(1));
        assert_eq!(dir["c.pak"], h(2));
        assert_eq!(dir["a.pak"], h(3));
        assert!(!dir.keys().any(|k| k.ends_with(RENAME_STAGING_SUFFIX)));
    }

    #[test]
    fn test_plan_discards_copy_of_correctly_named_file() {
        let local_files = [local("mod.pak", 1), local("mod (1).pak", 1)];
        let actions = reconcile(&local_files, &[entry(1, "mod.pak")], true);
        assert_eq!(actions.to_rename.len(), 1);
        assert_eq!(
            plan_renames(&local_files, &actions),
            vec![RenameStep::Discard {
                name: "mod (1).pak".into(),
                kept: "mod.pak".into()
            }]
        );
    }

    #[test]
    fn test_plan_discards_second_copy_of_misnamed_content() {
        let local_files = [local("x.pak", 1), local("y.pak", 1)];
        let actions = reconcile(&local_files, &[entry(1, "z.pak")], true);
        let steps = plan_renames(&local_files, &actions);
        assert_eq!(
            steps,
            vec![
                RenameStep::Discard {
                    name: "y.pak".into(),
                    kept: "z.pak".into()
                },
                RenameStep::Move {
                    from: "x.pak".into(),
                    to: "z.pak".into()
                },
            ]
        );
    }

    #[test]
    fn test_plan_rename_onto_removed_orphan_name() {
        // The orphan's name is freed by the remove phase before renames run.
        let local_files = [local("target.pak", 9), local("src.pak", 1)];
        let actions = reconcile(&local_files, &[entry(1, "target.pak")], true);
        assert_eq!(actions.to_remove, vec![local("target.pak", 9)]);
        assert_eq!(
            plan_renames(&local_files, &actions),
            vec![RenameStep::Move {
                from: "src.pak".into(),
                to: "target.pak".into()
            }]
        );
    }
}
