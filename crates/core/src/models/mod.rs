//! Shared domain models.

use std::{cmp::Ordering, collections::BTreeMap, fmt};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a library entry.
pub type GameId = Uuid;

/// Well-known keys of [`Game::metadata`].
pub mod keys {
    /// Long-form description.
    pub const DESCRIPTION: &str = "description";
    /// Path to the header artwork.
    pub const HEADER_IMG: &str = "header_img";
    /// Age or critic rating.
    pub const RATING: &str = "rating";
    /// Comma separated genres.
    pub const GENRE: &str = "genre";
    /// Developer credit.
    pub const DEVELOPER: &str = "developer";
    /// Publisher credit.
    pub const PUBLISHER: &str = "publisher";
    /// Release date as displayed.
    pub const RELEASE_DATE: &str = "release_date";
    /// Date of the last launch, see [`super::LAST_PLAYED_FORMAT`].
    pub const LAST_PLAYED: &str = "last_played";
}

/// Format used for the `last_played` metadata entry (e.g. `October 18, 2026`).
pub const LAST_PLAYED_FORMAT: &str = "%B %-d, %Y";
const LAST_PLAYED_PARSE_FORMAT: &str = "%B %d, %Y";

/// Storefront or runtime a game belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Platform {
    /// Native macOS application bundles.
    Mac,
    /// Steam installs discovered through app manifests.
    Steam,
    /// GOG Galaxy installs.
    Gog,
    /// Epic Games Store installs.
    Epic,
    /// Emulated titles.
    Emul,
    /// Anything else, including manually added entries.
    #[default]
    None,
}

impl Platform {
    /// Every platform in display order.
    pub const ALL: [Platform; 6] = [
        Platform::Mac,
        Platform::Steam,
        Platform::Gog,
        Platform::Epic,
        Platform::Emul,
        Platform::None,
    ];

    /// Map a configured platform name onto the closed enumeration.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "mac" | "macos" => Platform::Mac,
            "steam" => Platform::Steam,
            "gog" => Platform::Gog,
            "epic" | "epic games" => Platform::Epic,
            "emul" | "emulator" | "emulated" => Platform::Emul,
            _ => Platform::None,
        }
    }

    /// Section header used when grouping by platform.
    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Mac => "macOS",
            Platform::Steam => "Steam",
            Platform::Gog => "GOG",
            Platform::Epic => "Epic Games",
            Platform::Emul => "Emulated",
            Platform::None => "Other",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Play-through status chosen by the user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Currently being played.
    Playing,
    /// Main story finished.
    Beaten,
    /// Fully completed.
    Completed,
    /// Put aside.
    Shelved,
    /// Played now and then.
    Occasional,
    /// Owned but not started.
    Backlog,
    /// Not owned yet.
    Wishlist,
    /// No status assigned.
    #[default]
    None,
}

impl Status {
    /// Every status in display order.
    pub const ALL: [Status; 8] = [
        Status::Playing,
        Status::Beaten,
        Status::Completed,
        Status::Shelved,
        Status::Occasional,
        Status::Backlog,
        Status::Wishlist,
        Status::None,
    ];

    /// Section header used when grouping by status.
    pub fn display_name(self) -> &'static str {
        match self {
            Status::Playing => "Playing",
            Status::Beaten => "Beaten",
            Status::Completed => "Completed",
            Status::Shelved => "Shelved",
            Status::Occasional => "Occasional",
            Status::Backlog => "Backlog",
            Status::Wishlist => "Wishlist",
            Status::None => "No Status",
        }
    }
}

/// Bucket describing how long ago a game was last played.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Recency {
    /// Within the last day.
    Day,
    /// Within the last week.
    Week,
    /// Within the last 30 days.
    Month,
    /// Within the last 90 days.
    ThreeMonths,
    /// Within the last 180 days.
    SixMonths,
    /// Longer ago than six months.
    Year,
    /// Never launched.
    #[default]
    Never,
}

impl Recency {
    /// Every bucket in display order.
    pub const ALL: [Recency; 7] = [
        Recency::Day,
        Recency::Week,
        Recency::Month,
        Recency::ThreeMonths,
        Recency::SixMonths,
        Recency::Year,
        Recency::Never,
    ];

    /// Bucket for a game last played on `last_played`, as seen from `today`.
    pub fn since(last_played: NaiveDate, today: NaiveDate) -> Self {
        match (today - last_played).num_days() {
            i64::MIN..=1 => Recency::Day,
            2..=7 => Recency::Week,
            8..=30 => Recency::Month,
            31..=90 => Recency::ThreeMonths,
            91..=180 => Recency::SixMonths,
            _ => Recency::Year,
        }
    }

    /// Section header used when grouping by recency.
    pub fn display_name(self) -> &'static str {
        match self {
            Recency::Day => "Today",
            Recency::Week => "This Week",
            Recency::Month => "This Month",
            Recency::ThreeMonths => "Last 3 Months",
            Recency::SixMonths => "Last 6 Months",
            Recency::Year => "Over 6 Months Ago",
            Recency::Never => "Never Played",
        }
    }
}

/// Boolean state toggled from the library list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `isFavorite`
    Favorite,
    /// `isHidden`
    Hidden,
    /// `is_deleted` (soft delete)
    Deleted,
}

/// A persisted library entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Identity, generated once when the entry is created.
    pub id: GameId,
    /// Steam app id for games discovered through a manifest.
    #[serde(rename = "steamID", default, skip_serializing_if = "Option::is_none")]
    pub steam_id: Option<String>,
    /// Command used to start the game; empty when not configured.
    #[serde(default)]
    pub launcher: String,
    /// Free-form attributes, see [`keys`].
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Path to the list icon.
    #[serde(default)]
    pub icon: String,
    /// Display name, also used as the discovery dedup key.
    pub name: String,
    /// Owning platform.
    #[serde(default)]
    pub platform: Platform,
    /// Play-through status.
    #[serde(default)]
    pub status: Status,
    /// Last-played bucket derived from `metadata.last_played`.
    #[serde(default)]
    pub recency: Recency,
    /// Shown in the favorites section.
    #[serde(rename = "isFavorite", default)]
    pub is_favorite: bool,
    /// Hidden from the library list.
    #[serde(rename = "isHidden", default)]
    pub is_hidden: bool,
    /// Soft-deleted; retained on disk for recovery.
    #[serde(default)]
    pub is_deleted: bool,
}

impl Game {
    /// Create a fresh entry with a newly generated identity.
    pub fn new(name: impl Into<String>, platform: Platform, launcher: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            steam_id: None,
            launcher: launcher.into(),
            metadata: BTreeMap::new(),
            icon: String::new(),
            name: name.into(),
            platform,
            status: Status::None,
            recency: Recency::Never,
            is_favorite: false,
            is_hidden: false,
            is_deleted: false,
        }
    }

    /// Whether a launch command has been configured.
    pub fn has_launcher(&self) -> bool {
        !self.launcher.trim().is_empty()
    }

    /// Visible entries are neither hidden nor soft-deleted.
    pub fn is_visible(&self) -> bool {
        !self.is_hidden && !self.is_deleted
    }

    /// Read a flag.
    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::Favorite => self.is_favorite,
            Flag::Hidden => self.is_hidden,
            Flag::Deleted => self.is_deleted,
        }
    }

    /// Write a flag.
    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        match flag {
            Flag::Favorite => self.is_favorite = value,
            Flag::Hidden => self.is_hidden = value,
            Flag::Deleted => self.is_deleted = value,
        }
    }

    /// Parsed `last_played` date, if present and well-formed.
    pub fn last_played(&self) -> Option<NaiveDate> {
        let raw = self.metadata.get(keys::LAST_PLAYED)?;
        NaiveDate::parse_from_str(raw.trim(), LAST_PLAYED_PARSE_FORMAT).ok()
    }

    /// Record a launch on `date` and refresh the recency bucket.
    pub fn mark_played(&mut self, date: NaiveDate) {
        self.metadata.insert(
            keys::LAST_PLAYED.to_string(),
            date.format(LAST_PLAYED_FORMAT).to_string(),
        );
        self.recency = Recency::since(date, date);
    }

    /// Recompute [`Game::recency`] relative to `today`. Returns whether it changed.
    pub fn refresh_recency(&mut self, today: NaiveDate) -> bool {
        let recency = self
            .last_played()
            .map(|date| Recency::since(date, today))
            .unwrap_or(Recency::Never);
        let changed = recency != self.recency;
        self.recency = recency;
        changed
    }

    /// Metadata lookup that treats empty values as missing.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Ordering used for every list the library exposes.
    pub fn display_cmp(&self, other: &Self) -> Ordering {
        self.name
            .to_lowercase()
            .cmp(&other.name.to_lowercase())
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Changes requested by the edit action. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameEdit {
    /// New display name; blank names are ignored.
    pub name: Option<String>,
    /// New owning platform.
    pub platform: Option<Platform>,
    /// New play-through status.
    pub status: Option<Status>,
    /// New launch command.
    pub launcher: Option<String>,
    /// New icon path.
    pub icon: Option<String>,
    /// Metadata entries keyed by [`keys`]; an empty value clears the entry.
    pub metadata: BTreeMap<String, String>,
}

impl GameEdit {
    /// Whether applying this edit would change nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Set `key` to `value` when a value was given.
    pub fn with_meta(mut self, key: &str, value: Option<String>) -> Self {
        if let Some(value) = value {
            self.metadata.insert(key.to_string(), value);
        }
        self
    }

    /// Write the requested changes onto `game`.
    pub fn apply(self, game: &mut Game) {
        if let Some(name) = self.name.filter(|name| !name.trim().is_empty()) {
            game.name = name.trim().to_string();
        }
        if let Some(platform) = self.platform {
            game.platform = platform;
        }
        if let Some(status) = self.status {
            game.status = status;
        }
        if let Some(launcher) = self.launcher {
            game.launcher = launcher;
        }
        if let Some(icon) = self.icon {
            game.icon = icon;
        }
        for (key, value) in self.metadata {
            if value.trim().is_empty() {
                game.metadata.remove(&key);
            } else {
                game.metadata.insert(key, value);
            }
        }
    }
}

/// Top-level document of the persisted library file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameList {
    /// Every entry, including hidden and soft-deleted ones.
    #[serde(default)]
    pub games: Vec<Game>,
}

/// Today's date in UTC, used when no explicit clock is supplied.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
