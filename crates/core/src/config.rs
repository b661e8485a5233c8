//! Application configuration.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{discovery::MatchRule, manifest::MANIFEST_SUFFIX, models::Platform};

/// Directory under the user's config directory holding all pyre files.
pub const APP_DIR: &str = "pyre";
/// Name of the configuration file inside [`APP_DIR`].
pub const CONFIG_FILE: &str = "config.json";
/// Prefix for environment overrides, e.g. `PYRE__CATALOG__API_KEY`.
pub const ENV_PREFIX: &str = "PYRE";
/// `game_type` value selecting Steam manifest discovery.
pub const MANIFEST_GAME_TYPE: &str = "acf";

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%@|%s|\{\}").expect("invalid command placeholder regex"));

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Location of the persisted game list.
    pub library_path: PathBuf,
    /// Platforms to scan during reconciliation.
    pub platforms: Vec<PlatformConfig>,
    /// Remote metadata catalog.
    pub catalog: CatalogConfig,
    /// Reconciliation tuning.
    pub reconcile: ReconcileConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            library_path: app_dir().join("games.json"),
            platforms: default_platforms(),
            catalog: CatalogConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location layered with environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration from `path` (optional) layered with environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("failed to read config {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Serialize this configuration to `path`, creating parent directories.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let serialized =
            serde_json::to_string_pretty(self).context("failed to serialize configuration")?;
        fs::write(path, serialized).with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Write the default configuration if no config file exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    if !path.exists() {
        info!("writing default configuration to {}", path.display());
        AppConfig::default().write(&path)?;
    }
    Ok(path)
}

/// `<config dir>/pyre`
pub fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// `<config dir>/pyre/config.json`
pub fn config_path() -> PathBuf {
    app_dir().join(CONFIG_FILE)
}

/// Discovery rule for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Display name, also mapped onto [`Platform`] unless `platform` is set.
    pub name: String,
    /// Explicit platform override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// Roots to scan.
    #[serde(default)]
    pub game_directories: Vec<PathBuf>,
    /// Suffix of installed games, or [`MANIFEST_GAME_TYPE`].
    #[serde(default)]
    pub game_type: String,
    /// Launch command with one placeholder (`%@` or `{}`) for the path or app id.
    #[serde(default)]
    pub command_template: String,
    /// Directory extensions never descended into.
    #[serde(default = "default_bundle_extensions")]
    pub bundle_extensions: Vec<String>,
}

impl PlatformConfig {
    /// Platform assigned to games discovered by this rule.
    pub fn platform(&self) -> Platform {
        self.platform.unwrap_or_else(|| Platform::from_name(&self.name))
    }

    /// Whether games are discovered from Steam app manifests.
    pub fn is_manifest_based(&self) -> bool {
        self.game_type
            .trim()
            .trim_start_matches('.')
            .eq_ignore_ascii_case(MANIFEST_GAME_TYPE)
            || self.platform() == Platform::Steam
    }

    /// File-name suffix a matching entry ends with, always with a leading dot.
    pub fn suffix(&self) -> String {
        if self.is_manifest_based() {
            return MANIFEST_SUFFIX.to_string();
        }
        let game_type = self.game_type.trim();
        if game_type.contains('.') {
            game_type.to_string()
        } else {
            format!(".{game_type}")
        }
    }

    /// Scanner rule for this platform.
    pub fn match_rule(&self) -> MatchRule {
        if self.is_manifest_based() {
            MatchRule::Manifest
        } else {
            MatchRule::Suffix {
                suffix: self.suffix(),
                bundle_extensions: self.bundle_extensions.clone(),
            }
        }
    }

    /// Configured roots that currently exist as directories.
    pub fn existing_directories(&self) -> Vec<PathBuf> {
        self.game_directories
            .iter()
            .filter(|dir| {
                let exists = dir.is_dir();
                if !exists {
                    warn!("{}: skipping missing directory {}", self.name, dir.display());
                }
                exists
            })
            .cloned()
            .collect()
    }

    /// Substitute `locator` into the command template.
    pub fn render_command(&self, locator: &str) -> String {
        render_command(&self.command_template, locator)
    }
}

/// Replace the first placeholder of `template` with `locator`.
///
/// Templates without a placeholder are returned unchanged.
pub fn render_command(template: &str, locator: &str) -> String {
    PLACEHOLDER_RE
        .replacen(template, 1, NoExpand(locator))
        .into_owned()
}

fn default_bundle_extensions() -> Vec<String> {
    vec!["app".to_string()]
}

fn default_platforms() -> Vec<PlatformConfig> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let steam_root = dirs::data_dir()
        .map(|dir| dir.join("Steam"))
        .unwrap_or_else(|| home.join(".steam").join("steam"));

    vec![
        PlatformConfig {
            name: "Mac".to_string(),
            platform: Some(Platform::Mac),
            game_directories: vec![PathBuf::from("/Applications"), home.join("Applications")],
            game_type: "app".to_string(),
            command_template: "open \"%@\"".to_string(),
            bundle_extensions: default_bundle_extensions(),
        },
        PlatformConfig {
            name: "Steam".to_string(),
            platform: Some(Platform::Steam),
            game_directories: vec![steam_root.join("steamapps")],
            game_type: MANIFEST_GAME_TYPE.to_string(),
            command_template: "open steam://run/%@".to_string(),
            bundle_extensions: Vec::new(),
        },
    ]
}

/// Remote catalog connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Base URL of the catalog REST endpoint.
    pub base_url: String,
    /// Table (or view) holding catalog records.
    pub table: String,
    /// API key sent as `apikey` and bearer token.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            table: "igdb_games".to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

impl CatalogConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Reconciliation tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Upper bound on catalog lookups in flight.
    pub max_concurrent_lookups: usize,
    /// Time allowed for a single lookup before it counts as a miss.
    pub lookup_timeout_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: 4,
            lookup_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn platform(name: &str, game_type: &str) -> PlatformConfig {
        PlatformConfig {
            name: name.to_string(),
            platform: None,
            game_directories: Vec::new(),
            game_type: game_type.to_string(),
            command_template: String::new(),
            bundle_extensions: default_bundle_extensions(),
        }
    }

    #[test]
    fn suffix_gains_leading_dot() {
        assert_eq!(platform("Mac", "app").suffix(), ".app");
        assert_eq!(platform("Emulator", ".gba").suffix(), ".gba");
        assert_eq!(platform("Steam", "").suffix(), ".acf");
    }

    #[test]
    fn manifest_rule_by_sentinel_or_platform() {
        assert!(platform("Steam", "").is_manifest_based());
        assert!(platform("Custom", ".acf").is_manifest_based());
        assert!(!platform("GOG", "app").is_manifest_based());
        assert_eq!(platform("Steam", "acf").match_rule(), MatchRule::Manifest);
        assert_eq!(
            platform("GOG", "app").match_rule(),
            MatchRule::Suffix {
                suffix: ".app".to_string(),
                bundle_extensions: vec!["app".to_string()],
            }
        );
    }

    #[test]
    fn renders_first_placeholder_only() {
        assert_eq!(
            render_command("open \"%@\"", "/Applications/Celeste.app"),
            "open \"/Applications/Celeste.app\""
        );
        assert_eq!(render_command("steam://run/{}", "440"), "steam://run/440");
        assert_eq!(render_command("run %@ %@", "$1"), "run $1 %@");
        assert_eq!(render_command("launch-all", "x"), "launch-all");
    }

    #[test]
    fn load_merges_file_with_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{
  "library_path": "/tmp/pyre-games.json",
  "platforms": [
    { "name": "GOG", "game_directories": ["/games/gog"], "game_type": "app", "command_template": "open %@" }
  ],
  "reconcile": { "max_concurrent_lookups": 2 }
}"#,
        )?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.library_path, PathBuf::from("/tmp/pyre-games.json"));
        assert_eq!(config.platforms.len(), 1);
        assert_eq!(config.platforms[0].platform(), Platform::Gog);
        assert_eq!(config.platforms[0].bundle_extensions, vec!["app".to_string()]);
        assert_eq!(config.reconcile.max_concurrent_lookups, 2);
        assert_eq!(config.reconcile.lookup_timeout_secs, 10);
        assert_eq!(config.catalog.table, "igdb_games");
        Ok(())
    }

    struct EnvVars(&'static [&'static str]);

    impl Drop for EnvVars {
        fn drop(&mut self) {
            for key in self.0 {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn environment_overrides_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{ "catalog": { "base_url": "https://file.example", "api_key": "from-file" } }"#,
        )?;

        let _vars = EnvVars(&["PYRE__CATALOG__BASE_URL", "PYRE__CATALOG__API_KEY"]);
        std::env::set_var("PYRE__CATALOG__BASE_URL", "https://env.example");
        std::env::set_var("PYRE__CATALOG__API_KEY", "k123");

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.catalog.base_url, "https://env.example");
        assert_eq!(config.catalog.api_key.as_deref(), Some("k123"));
        assert_eq!(config.catalog.table, "igdb_games");
        Ok(())
    }

    #[test]
    fn write_then_load_round_trips() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let mut config = AppConfig::default();
        config.catalog.timeout_secs = 3;
        config.write(&path)?;

        let loaded = AppConfig::load_from(&path)?;
        assert_eq!(loaded.platforms, config.platforms);
        assert_eq!(loaded.catalog.timeout_secs, 3);
        Ok(())
    }

    #[test]
    fn existing_directories_skips_missing() -> Result<()> {
        let dir = tempdir()?;
        let mut config = platform("Mac", "app");
        config.game_directories = vec![dir.path().to_path_buf(), dir.path().join("absent")];
        assert_eq!(config.existing_directories(), vec![dir.path().to_path_buf()]);
        Ok(())
    }
}
