//! Filtered and sectioned views over the library.

use crate::models::{Game, Platform, Recency, Status};

/// Grouping applied to non-favorite games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    /// One section per platform.
    #[default]
    Platform,
    /// One section per play-through status.
    Status,
    /// A single alphabetical section.
    Name,
    /// One section per last-played bucket.
    Recency,
}

/// A titled group of games.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Header text.
    pub title: String,
    /// Entries in display order.
    pub games: Vec<Game>,
}

/// Visible games whose name contains `query` (case-insensitive). An empty query matches all.
pub fn games_matching(games: &[Game], query: &str) -> Vec<Game> {
    let needle = query.trim().to_lowercase();
    games
        .iter()
        .filter(|game| game.is_visible())
        .filter(|game| needle.is_empty() || game.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Favorites first, then the remaining visible games grouped by `sort_by`.
///
/// Empty sections are omitted.
pub fn sections(games: &[Game], sort_by: SortBy, query: &str) -> Vec<Section> {
    let matching = games_matching(games, query);
    let (favorites, others): (Vec<Game>, Vec<Game>) =
        matching.into_iter().partition(|game| game.is_favorite);

    let mut sections = Vec::new();
    push_section(&mut sections, "Favorites", favorites);

    match sort_by {
        SortBy::Platform => {
            for platform in Platform::ALL {
                let group = others.iter().filter(|g| g.platform == platform).cloned().collect();
                push_section(&mut sections, platform.display_name(), group);
            }
        }
        SortBy::Status => {
            for status in Status::ALL {
                let group = others.iter().filter(|g| g.status == status).cloned().collect();
                push_section(&mut sections, status.display_name(), group);
            }
        }
        SortBy::Recency => {
            for recency in Recency::ALL {
                let group = others.iter().filter(|g| g.recency == recency).cloned().collect();
                push_section(&mut sections, recency.display_name(), group);
            }
        }
        SortBy::Name => push_section(&mut sections, "Name", others),
    }

    sections
}

fn push_section(sections: &mut Vec<Section>, title: &str, games: Vec<Game>) {
    if !games.is_empty() {
        sections.push(Section {
            title: title.to_string(),
            games,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> Vec<Game> {
        let mut hades = Game::new("Hades", Platform::Epic, "");
        hades.is_favorite = true;
        let mut hidden = Game::new("Hidden Folks", Platform::Mac, "");
        hidden.is_hidden = true;
        let mut deleted = Game::new("Half-Life", Platform::Steam, "");
        deleted.is_deleted = true;
        let mut portal = Game::new("Portal 2", Platform::Steam, "");
        portal.status = Status::Completed;
        let celeste = Game::new("Celeste", Platform::Mac, "");
        vec![celeste, hades, deleted, hidden, portal]
    }

    #[test]
    fn search_skips_hidden_and_deleted() {
        let games = library();
        let names: Vec<_> = games_matching(&games, "H")
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["Hades".to_string()]);
        assert_eq!(games_matching(&games, "").len(), 3);
    }

    #[test]
    fn favorites_lead_platform_sections() {
        let sections = sections(&library(), SortBy::Platform, "");
        let titles: Vec<_> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Favorites", "macOS", "Steam"]);
        assert_eq!(sections[0].games[0].name, "Hades");
    }

    #[test]
    fn status_and_name_grouping() {
        let by_status = sections(&library(), SortBy::Status, "");
        let titles: Vec<_> = by_status.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Favorites", "Completed", "No Status"]);

        let by_name = sections(&library(), SortBy::Name, "portal");
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].title, "Name");
        assert_eq!(by_name[0].games[0].name, "Portal 2");
    }
}
