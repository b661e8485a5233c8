use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::{
    catalog::CatalogRecord,
    config::PlatformConfig,
    manifest::AppManifest,
    models::{Game, Platform},
};

use super::scanner::DirectoryScanner;

/// Where a discovered installation was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// Steam app id read from a manifest.
    SteamId(String),
    /// Installed bundle or file on disk.
    Path(PathBuf),
}

/// An installation found on disk that has not been confirmed by the catalog yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCandidate {
    /// Name used for dedup and catalog lookup.
    pub name: String,
    /// Platform of the rule that found it.
    pub platform: Platform,
    /// Steam id or path.
    pub locator: Locator,
    /// Launch command rendered from the platform template.
    pub launcher: String,
}

impl DiscoveredCandidate {
    /// Build a candidate from a Steam manifest.
    ///
    /// Returns `Ok(None)` when the manifest lacks `name` or `appid`.
    pub fn from_manifest(path: &Path, config: &PlatformConfig) -> Result<Option<Self>> {
        let manifest = AppManifest::load(path)?;
        let (Some(app_id), Some(name)) = (manifest.app_id(), manifest.name()) else {
            return Ok(None);
        };
        Ok(Some(Self {
            name: name.to_string(),
            platform: config.platform(),
            locator: Locator::SteamId(app_id.to_string()),
            launcher: config.render_command(app_id),
        }))
    }

    /// Build a candidate from a path matched by suffix.
    ///
    /// The name is the file name with the platform suffix removed.
    pub fn from_path(path: &Path, config: &PlatformConfig) -> Option<Self> {
        let file_name = path.file_name()?.to_string_lossy();
        let name = file_name.strip_suffix(config.suffix().as_str())?.trim();
        if name.is_empty() {
            return None;
        }
        let locator = path.to_string_lossy();
        Some(Self {
            name: name.to_string(),
            platform: config.platform(),
            launcher: config.render_command(&locator),
            locator: Locator::Path(path.to_path_buf()),
        })
    }

    /// Steam app id, when discovered through a manifest.
    pub fn steam_id(&self) -> Option<&str> {
        match &self.locator {
            Locator::SteamId(id) => Some(id),
            Locator::Path(_) => None,
        }
    }

    /// Turn the candidate into a library entry populated from `record`.
    pub fn into_game(self, record: &CatalogRecord) -> Game {
        let mut game = Game::new(self.name, self.platform, self.launcher);
        if let Locator::SteamId(id) = self.locator {
            game.steam_id = Some(id);
        }
        record.apply_to(&mut game);
        game
    }
}

/// Result of scanning every configured platform.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Number of paths matched across all platforms.
    pub scanned: usize,
    /// Candidates in priority order: manifest-based platforms first.
    pub candidates: Vec<DiscoveredCandidate>,
}

/// Entry point for turning platform configuration into candidates.
pub struct GameDiscovery;

impl GameDiscovery {
    /// Scan every platform with at least one existing directory and extract candidates.
    ///
    /// Blocking; run it off the async executor.
    pub fn discover(platforms: &[PlatformConfig]) -> Discovery {
        let mut manifest_based = Vec::new();
        let mut by_suffix = Vec::new();
        let mut scanned = 0;

        for platform in platforms {
            let roots = platform.existing_directories();
            if roots.is_empty() {
                debug!("{}: no directories to scan", platform.name);
                continue;
            }

            let paths = DirectoryScanner::new(platform.match_rule()).scan(&roots);
            info!("{}: {} matching paths", platform.name, paths.len());
            scanned += paths.len();

            let candidates = extract_candidates(platform, &paths);
            if platform.is_manifest_based() {
                manifest_based.extend(candidates);
            } else {
                by_suffix.extend(candidates);
            }
        }

        manifest_based.extend(by_suffix);
        Discovery {
            scanned,
            candidates: manifest_based,
        }
    }
}

/// Turn one platform's matched paths into candidates, skipping unusable ones.
pub fn extract_candidates(
    platform: &PlatformConfig,
    paths: &HashSet<PathBuf>,
) -> Vec<DiscoveredCandidate> {
    let mut sorted: Vec<&PathBuf> = paths.iter().collect();
    sorted.sort();

    let mut candidates = Vec::new();
    for path in sorted {
        if platform.is_manifest_based() {
            match DiscoveredCandidate::from_manifest(path, platform) {
                Ok(Some(candidate)) => {
                    info!("{} detected in {} directory", candidate.name, platform.name);
                    candidates.push(candidate);
                }
                Ok(None) => warn!("Skipping {}: manifest lacks name or appid", path.display()),
                Err(err) => warn!("Skipping {}: {err:#}", path.display()),
            }
        } else if let Some(candidate) = DiscoveredCandidate::from_path(path, platform) {
            candidates.push(candidate);
        }
    }
    candidates
}
