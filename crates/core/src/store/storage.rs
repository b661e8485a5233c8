use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::{
    config,
    models::{Game, GameList},
};

/// Durable backing for the game library.
pub trait LibraryStorage: Send + Sync {
    /// Read the persisted list; `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Vec<Game>>>;

    /// Replace the persisted list with `games`.
    fn save(&self, games: &[Game]) -> Result<()>;
}

#[derive(Serialize)]
struct GameListRef<'a> {
    games: &'a [Game],
}

/// Library stored as a single JSON document (`{"games": [...]}`).
///
/// Saves go through a temporary file in the same directory followed by a
/// rename, so readers never observe a partially written file.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Storage backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location under the user's config directory.
    pub fn default_path() -> PathBuf {
        config::app_dir().join("games.json")
    }

    /// File backing this storage.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LibraryStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<Vec<Game>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let list: GameList = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(Some(list.games))
    }

    fn save(&self, games: &[Game]) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let serialized = serde_json::to_vec_pretty(&GameListRef { games })
            .context("failed to serialize game library")?;
        let mut file = NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;
        file.write_all(&serialized)
            .with_context(|| format!("failed to write {}", file.path().display()))?;
        file.as_file().sync_all()?;
        file.persist(&self.path)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}
