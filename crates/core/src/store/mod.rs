//! The authoritative game library.
//!
//! [`GameStore`] owns the in-memory list and its persisted mirror. Every
//! mutation takes the store lock, applies the change, and writes the full
//! list before releasing it, so concurrent writers (a reconciliation run and
//! user actions) are serialized and the file always holds a complete
//! snapshot of the last committed state.

use std::{collections::HashSet, sync::Arc};

use anyhow::Result;
use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::models::{Flag, Game, GameId};

/// Persistence backends.
pub mod storage;
pub mod view;

pub use storage::{JsonFileStorage, LibraryStorage};
pub use view::{Section, SortBy};

const EVENT_CAPACITY: usize = 64;

/// Change notification published after a mutation has been persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// Entries were added or replaced.
    Upserted(Vec<GameId>),
    /// A single entry was edited.
    Updated(GameId),
    /// An entry was physically removed.
    Removed(GameId),
}

/// Read the persisted library, treating a missing or corrupt file as empty.
pub fn load(storage: &dyn LibraryStorage) -> Vec<Game> {
    match storage.load() {
        Ok(Some(games)) => games,
        Ok(None) => Vec::new(),
        Err(err) => {
            warn!("Failed to load game library, starting empty: {err:#}");
            Vec::new()
        }
    }
}

/// Shared handle to the game library. Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct GameStore {
    games: Arc<Mutex<Vec<Game>>>,
    storage: Arc<dyn LibraryStorage>,
    events: broadcast::Sender<StoreEvent>,
}

impl GameStore {
    /// Open the library held by `storage`.
    pub fn open(storage: impl LibraryStorage + 'static) -> Self {
        Self::with_storage(Arc::new(storage))
    }

    /// Open the library held by a shared storage backend.
    pub fn with_storage(storage: Arc<dyn LibraryStorage>) -> Self {
        let mut games = load(storage.as_ref());
        games.sort_by(Game::display_cmp);
        info!("Loaded {} games", games.len());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            games: Arc::new(Mutex::new(games)),
            storage,
            events,
        }
    }

    /// Every entry, sorted for display.
    pub fn all(&self) -> Vec<Game> {
        self.games.lock().clone()
    }

    /// Number of entries, including hidden and deleted ones.
    pub fn len(&self) -> usize {
        self.games.lock().len()
    }

    /// Whether the library has no entries.
    pub fn is_empty(&self) -> bool {
        self.games.lock().is_empty()
    }

    /// Entry with identity `id`.
    pub fn by_id(&self, id: GameId) -> Option<Game> {
        self.games.lock().iter().find(|game| game.id == id).cloned()
    }

    /// First entry named exactly `name`.
    pub fn by_name(&self, name: &str) -> Option<Game> {
        self.games
            .lock()
            .iter()
            .find(|game| game.name == name)
            .cloned()
    }

    /// Snapshot of every known name, used to skip already imported games.
    pub fn names(&self) -> HashSet<String> {
        self.games
            .lock()
            .iter()
            .map(|game| game.name.clone())
            .collect()
    }

    /// Visible entries whose name contains `query`.
    pub fn games_matching(&self, query: &str) -> Vec<Game> {
        view::games_matching(&self.games.lock(), query)
    }

    /// Sectioned view for list display.
    pub fn sections(&self, sort_by: SortBy, query: &str) -> Vec<Section> {
        view::sections(&self.games.lock(), sort_by, query)
    }

    /// Add `game`, replacing the entry with the same identity if there is one.
    pub fn upsert(&self, game: Game) {
        self.upsert_many(vec![game]);
    }

    /// Add or replace several entries with a single write. Returns how many were applied.
    pub fn upsert_many(&self, incoming: Vec<Game>) -> usize {
        if incoming.is_empty() {
            return 0;
        }
        let ids: Vec<GameId> = incoming.iter().map(|game| game.id).collect();
        {
            let mut games = self.games.lock();
            for game in incoming {
                info!("Adding game {}", game.name);
                match games.iter().position(|existing| existing.id == game.id) {
                    Some(index) => games[index] = game,
                    None => games.push(game),
                }
            }
            games.sort_by(Game::display_cmp);
            self.write(&games);
        }
        let count = ids.len();
        self.emit(StoreEvent::Upserted(ids));
        count
    }

    /// Apply `edit` to the entry `id`. The identity is preserved.
    pub fn update(&self, id: GameId, edit: impl FnOnce(&mut Game)) -> Option<Game> {
        let updated = {
            let mut games = self.games.lock();
            let game = games.iter_mut().find(|game| game.id == id)?;
            edit(game);
            game.id = id;
            let updated = game.clone();
            games.sort_by(Game::display_cmp);
            self.write(&games);
            updated
        };
        self.emit(StoreEvent::Updated(id));
        Some(updated)
    }

    /// Set a favorite/hidden/deleted flag.
    pub fn set_flag(&self, id: GameId, flag: Flag, value: bool) -> Option<Game> {
        self.update(id, |game| game.set_flag(flag, value))
    }

    /// Flip a favorite/hidden/deleted flag.
    pub fn toggle_flag(&self, id: GameId, flag: Flag) -> Option<Game> {
        self.update(id, |game| {
            let value = !game.flag(flag);
            game.set_flag(flag, value);
        })
    }

    /// Record a launch of `id` on `date`.
    pub fn record_played(&self, id: GameId, date: NaiveDate) -> Option<Game> {
        self.update(id, |game| game.mark_played(date))
    }

    /// Recompute every recency bucket relative to `today`. Returns how many changed.
    pub fn refresh_recency(&self, today: NaiveDate) -> usize {
        let changed: Vec<GameId> = {
            let mut games = self.games.lock();
            let changed: Vec<GameId> = games
                .iter_mut()
                .filter_map(|game| game.refresh_recency(today).then_some(game.id))
                .collect();
            if !changed.is_empty() {
                self.write(&games);
            }
            changed
        };
        let count = changed.len();
        for id in changed {
            self.emit(StoreEvent::Updated(id));
        }
        count
    }

    /// Physically remove `id` from the library.
    pub fn remove(&self, id: GameId) -> Option<Game> {
        let removed = {
            let mut games = self.games.lock();
            let index = games.iter().position(|game| game.id == id)?;
            let removed = games.remove(index);
            info!("Removing game {}", removed.name);
            self.write(&games);
            removed
        };
        self.emit(StoreEvent::Removed(id));
        Some(removed)
    }

    /// Write the current list to storage.
    pub fn persist(&self) -> Result<()> {
        let games = self.games.lock();
        self.storage.save(&games)
    }

    /// Receive a [`StoreEvent`] after every committed mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // Called with the lock held.
    fn write(&self, games: &[Game]) {
        if let Err(err) = self.storage.save(games) {
            error!("Failed to persist game library: {err:#}");
        }
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{keys, GameEdit, Platform, Recency, Status};
    use std::fs;
    use tempfile::tempdir;

    fn store_at(path: &std::path::Path) -> GameStore {
        GameStore::open(JsonFileStorage::new(path))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn reload_yields_equal_list() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.json");
        let store = store_at(&path);
        let mut portal = Game::new("Portal 2", Platform::Steam, "open steam://run/620");
        portal.steam_id = Some("620".to_string());
        portal
            .metadata
            .insert(keys::GENRE.to_string(), "Puzzle".to_string());
        store.upsert_many(vec![portal, Game::new("celeste", Platform::Mac, "")]);

        let reopened = store_at(&path);
        assert_eq!(reopened.all(), store.all());
        let names: Vec<_> = reopened.all().into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["celeste".to_string(), "Portal 2".to_string()]);
        Ok(())
    }

    #[test]
    fn corrupt_library_opens_empty() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.json");
        fs::write(&path, "not json")?;

        let store = store_at(&path);
        assert!(store.is_empty());
        store.upsert(Game::new("Tunic", Platform::Mac, ""));
        assert_eq!(store_at(&path).len(), 1);
        Ok(())
    }

    #[test]
    fn upsert_replaces_by_identity() -> Result<()> {
        let dir = tempdir()?;
        let store = store_at(&dir.path().join("games.json"));
        let mut game = Game::new("Hades", Platform::Epic, "");
        store.upsert(game.clone());

        game.launcher = "open -a Hades".to_string();
        store.upsert(game.clone());
        store.upsert(Game::new("Hades", Platform::Steam, ""));

        assert_eq!(store.len(), 2);
        assert_eq!(
            store.by_id(game.id).map(|g| g.launcher),
            Some("open -a Hades".to_string())
        );
        assert_eq!(store.names().len(), 1);
        Ok(())
    }

    #[test]
    fn hide_survives_reload_independent_of_favorite() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.json");
        let store = store_at(&path);
        let game = Game::new("Outer Wilds", Platform::Epic, "");
        let id = game.id;
        store.upsert(game);

        store.toggle_flag(id, Flag::Hidden);
        let reopened = store_at(&path).by_id(id).expect("persisted game");
        assert!(reopened.is_hidden);
        assert!(!reopened.is_favorite);

        store.toggle_flag(id, Flag::Favorite);
        let reopened = store_at(&path).by_id(id).expect("persisted game");
        assert!(reopened.is_hidden);
        assert!(reopened.is_favorite);

        store.set_flag(id, Flag::Hidden, false);
        let reopened = store_at(&path).by_id(id).expect("persisted game");
        assert!(!reopened.is_hidden);
        assert!(reopened.is_favorite);
        Ok(())
    }

    #[test]
    fn soft_delete_keeps_entry_remove_drops_it() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.json");
        let store = store_at(&path);
        let game = Game::new("Inside", Platform::Steam, "");
        let id = game.id;
        store.upsert(game);

        store.set_flag(id, Flag::Deleted, true);
        assert_eq!(store_at(&path).len(), 1);
        assert!(store.games_matching("").is_empty());

        assert!(store.remove(id).is_some());
        assert!(store_at(&path).is_empty());
        assert!(store.remove(id).is_none());
        assert!(store.set_flag(id, Flag::Hidden, true).is_none());
        Ok(())
    }

    #[test]
    fn update_preserves_identity() -> Result<()> {
        let dir = tempdir()?;
        let store = store_at(&dir.path().join("games.json"));
        let game = Game::new("Braid", Platform::None, "");
        let id = game.id;
        store.upsert(game);

        let edited = store
            .update(id, |game| {
                game.name = "Braid, Anniversary Edition".to_string();
                game.id = GameId::nil();
            })
            .expect("edited game");
        assert_eq!(edited.id, id);
        assert!(store.by_name("Braid, Anniversary Edition").is_some());
        assert!(store.by_name("Braid").is_none());
        Ok(())
    }

    #[test]
    fn edits_persist_every_field() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.json");
        let store = store_at(&path);
        let game = Game::new("Celeste", Platform::None, "");
        let id = game.id;
        store.upsert(game);

        let edit = GameEdit {
            platform: Some(Platform::Mac),
            status: Some(Status::Completed),
            icon: Some("/icons/celeste.png".to_string()),
            ..GameEdit::default()
        }
        .with_meta(keys::DESCRIPTION, Some("Climb the mountain.".to_string()))
        .with_meta(keys::RELEASE_DATE, Some("January 25, 2018".to_string()));
        store.update(id, |game| edit.apply(game));

        let reopened = store_at(&path).by_id(id).expect("persisted game");
        assert_eq!(reopened.platform, Platform::Mac);
        assert_eq!(reopened.status, Status::Completed);
        assert_eq!(reopened.icon, "/icons/celeste.png");
        assert_eq!(reopened.meta(keys::DESCRIPTION), Some("Climb the mountain."));
        assert_eq!(reopened.meta(keys::RELEASE_DATE), Some("January 25, 2018"));
        Ok(())
    }

    #[test]
    fn record_played_and_refresh_recency() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.json");
        let store = store_at(&path);
        let game = Game::new("Celeste", Platform::Mac, "");
        let id = game.id;
        store.upsert(game);

        let played = store.record_played(id, date(2026, 10, 1)).expect("game");
        assert_eq!(played.meta(keys::LAST_PLAYED), Some("October 1, 2026"));
        assert_eq!(played.recency, Recency::Day);

        assert_eq!(store.refresh_recency(date(2026, 10, 18)), 1);
        assert_eq!(store.refresh_recency(date(2026, 10, 18)), 0);
        assert_eq!(
            store_at(&path).by_id(id).map(|g| g.recency),
            Some(Recency::Month)
        );
        Ok(())
    }

    #[test]
    fn persistence_failure_keeps_memory_state() -> Result<()> {
        let dir = tempdir()?;
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "")?;
        let store = store_at(&blocker.join("games.json"));

        store.upsert(Game::new("Celeste", Platform::Mac, ""));
        assert_eq!(store.len(), 1);
        assert!(store.persist().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn subscribers_see_committed_changes() -> Result<()> {
        let dir = tempdir()?;
        let store = store_at(&dir.path().join("games.json"));
        let mut events = store.subscribe();
        let game = Game::new("Hades", Platform::Epic, "");
        let id = game.id;

        store.upsert(game);
        store.toggle_flag(id, Flag::Favorite);
        store.remove(id);

        assert_eq!(events.recv().await?, StoreEvent::Upserted(vec![id]));
        assert_eq!(events.recv().await?, StoreEvent::Updated(id));
        assert_eq!(events.recv().await?, StoreEvent::Removed(id));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mutations_are_not_lost() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games.json");
        let store = store_at(&path);
        let games: Vec<Game> = (0..16)
            .map(|n| Game::new(format!("Game {n:02}"), Platform::None, ""))
            .collect();
        let ids: Vec<GameId> = games.iter().map(|g| g.id).collect();
        store.upsert_many(games);

        let mut tasks = Vec::new();
        for (n, id) in ids.iter().copied().enumerate() {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                if n % 2 == 0 {
                    store.toggle_flag(id, Flag::Favorite);
                } else {
                    store.toggle_flag(id, Flag::Hidden);
                }
            }));
        }
        let extra = {
            let store = store.clone();
            tokio::spawn(async move { store.upsert(Game::new("Late Arrival", Platform::Gog, "")) })
        };
        for task in tasks {
            task.await?;
        }
        extra.await?;

        let reopened = store_at(&path);
        assert_eq!(reopened.len(), 17);
        for (n, id) in ids.iter().enumerate() {
            let game = reopened.by_id(*id).expect("persisted game");
            assert_eq!(game.is_favorite, n % 2 == 0, "favorite flag of {}", game.name);
            assert_eq!(game.is_hidden, n % 2 == 1, "hidden flag of {}", game.name);
        }
        Ok(())
    }
}
