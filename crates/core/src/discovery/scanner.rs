use std::{
    collections::HashSet,
    ffi::OsStr,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::manifest::MANIFEST_SUFFIX;

/// How a platform recognises installed games on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRule {
    /// Entries (files or directories) whose name ends with `suffix`.
    Suffix {
        /// Suffix including the leading dot, e.g. `.app`.
        suffix: String,
        /// Directory extensions treated as opaque bundles and never descended into.
        bundle_extensions: Vec<String>,
    },
    /// Steam app manifests (`*.acf` files).
    Manifest,
}

/// Walks platform roots collecting entries that satisfy a [`MatchRule`].
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    rule: MatchRule,
}

impl DirectoryScanner {
    /// Build a scanner for `rule`.
    pub fn new(rule: MatchRule) -> Self {
        Self { rule }
    }

    /// Rule this scanner applies.
    pub fn rule(&self) -> &MatchRule {
        &self.rule
    }

    /// Scan every root, returning the set of matching paths.
    ///
    /// Unreadable roots and entries are logged and skipped. A root that is
    /// itself a bundle is matched like any other entry and never walked.
    pub fn scan<P: AsRef<Path>>(&self, roots: &[P]) -> HashSet<PathBuf> {
        let mut matches = HashSet::new();
        for root in roots {
            self.scan_root(root.as_ref(), &mut matches);
        }
        matches
    }

    fn scan_root(&self, root: &Path, matches: &mut HashSet<PathBuf>) {
        if !root.is_dir() {
            warn!("skipping scan root {}: not a readable directory", root.display());
            return;
        }
        if self.is_bundle(root) {
            if root.file_name().is_some_and(|name| self.matches(name, true)) {
                matches.insert(root.to_path_buf());
            }
            return;
        }

        // Loop detection in walkdir surfaces symlink cycles as errors.
        let mut entries = WalkDir::new(root).follow_links(true).min_depth(1).into_iter();
        loop {
            let entry = match entries.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    warn!("error while scanning {}: {err}", root.display());
                    continue;
                }
            };

            let is_dir = entry.file_type().is_dir();
            if self.matches(entry.file_name(), is_dir) {
                debug!("matched {}", entry.path().display());
                matches.insert(entry.path().to_path_buf());
            }

            if is_dir && self.is_bundle(entry.path()) {
                entries.skip_current_dir();
            }
        }
    }

    fn matches(&self, file_name: &OsStr, is_dir: bool) -> bool {
        let name = file_name.to_string_lossy();
        match &self.rule {
            MatchRule::Suffix { suffix, .. } => {
                name.len() > suffix.len() && name.ends_with(suffix.as_str())
            }
            MatchRule::Manifest => !is_dir && name.ends_with(MANIFEST_SUFFIX),
        }
    }

    fn is_bundle(&self, path: &Path) -> bool {
        let MatchRule::Suffix {
            bundle_extensions, ..
        } = &self.rule
        else {
            return false;
        };
        path.extension()
            .and_then(OsStr::to_str)
            .map(|ext| {
                bundle_extensions
                    .iter()
                    .any(|bundle| bundle.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    fn app_rule() -> MatchRule {
        MatchRule::Suffix {
            suffix: ".app".to_string(),
            bundle_extensions: vec!["app".to_string()],
        }
    }

    #[test]
    fn does_not_descend_into_bundles() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path();
        let bundle = root.join("Celeste.app");
        fs::create_dir_all(bundle.join("Contents/Resources/Helper.app/Contents"))?;
        fs::create_dir_all(root.join("Indie/Hades.app/Contents"))?;
        fs::write(root.join("Indie/readme.txt"), "not a game")?;

        let found = DirectoryScanner::new(app_rule()).scan(&[root]);
        let expected: HashSet<PathBuf> =
            [bundle, root.join("Indie/Hades.app")].into_iter().collect();
        assert_eq!(found, expected);
        Ok(())
    }

    #[test]
    fn bundle_root_is_matched_but_not_walked() -> Result<()> {
        let dir = tempdir()?;
        let bundle = dir.path().join("Celeste.app");
        fs::create_dir_all(bundle.join("Contents/Resources/Helper.app"))?;

        let found = DirectoryScanner::new(app_rule()).scan(&[&bundle]);
        let expected: HashSet<PathBuf> = [bundle].into_iter().collect();
        assert_eq!(found, expected);
        Ok(())
    }

    #[test]
    fn matches_plain_files_by_suffix() -> Result<()> {
        let dir = tempdir()?;
        let roms = dir.path().join("roms");
        fs::create_dir_all(roms.join("gba"))?;
        fs::write(roms.join("gba/Metroid Fusion.gba"), b"rom")?;
        fs::write(roms.join("gba/notes.txt"), b"")?;
        fs::write(roms.join(".gba"), b"")?;

        let rule = MatchRule::Suffix {
            suffix: ".gba".to_string(),
            bundle_extensions: Vec::new(),
        };
        let found = DirectoryScanner::new(rule).scan(&[&roms]);
        assert_eq!(found.len(), 1);
        assert!(found.contains(&roms.join("gba/Metroid Fusion.gba")));
        Ok(())
    }

    #[test]
    fn manifest_rule_collects_acf_files_only() -> Result<()> {
        let dir = tempdir()?;
        let steamapps = dir.path().join("steamapps");
        fs::create_dir_all(steamapps.join("common/Portal 2"))?;
        fs::create_dir_all(steamapps.join("odd.acf"))?;
        fs::write(steamapps.join("appmanifest_620.acf"), "\"AppState\" {}")?;
        fs::write(steamapps.join("libraryfolders.vdf"), "")?;

        let found = DirectoryScanner::new(MatchRule::Manifest).scan(&[&steamapps]);
        assert_eq!(found.len(), 1);
        assert!(found.contains(&steamapps.join("appmanifest_620.acf")));
        Ok(())
    }

    #[test]
    fn missing_roots_are_skipped() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("Game.app"))?;
        let roots = vec![dir.path().join("does-not-exist"), dir.path().to_path_buf()];

        let found = DirectoryScanner::new(app_rule()).scan(&roots);
        assert_eq!(found.len(), 1);
        Ok(())
    }

    #[test]
    fn overlapping_roots_yield_unique_paths() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("a/Game.app"))?;
        let roots = vec![dir.path().to_path_buf(), dir.path().to_path_buf()];

        let found = DirectoryScanner::new(app_rule()).scan(&roots);
        assert_eq!(found.len(), 1);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn survives_symlink_cycles() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path();
        fs::create_dir_all(root.join("library/Game.app"))?;
        std::os::unix::fs::symlink(root.join("library"), root.join("library/loop"))?;

        let found = DirectoryScanner::new(app_rule()).scan(&[root.join("library")]);
        assert!(found.contains(&root.join("library/Game.app")));
        Ok(())
    }
}
