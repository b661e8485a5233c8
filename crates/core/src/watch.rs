//! Filesystem notifications for platform directories.

use std::path::PathBuf;

use anyhow::{Context, Result};
use notify::{
    event::ModifyKind, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::config::PlatformConfig;

/// Message sent to the owner of a [`LibraryWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Something was installed, removed or renamed under a platform directory.
    LibraryChanged {
        /// Paths reported by the notification.
        paths: Vec<PathBuf>,
    },
}

/// Whether `event` can change the set of installed games.
pub fn is_library_change(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    )
}

/// Keeps a recursive watch on every existing platform directory.
///
/// Notifications stop when the watcher is dropped.
pub struct LibraryWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl LibraryWatcher {
    /// Start watching and forward relevant changes to `sender`.
    ///
    /// While a message is still queued further changes are dropped, so a
    /// burst of file operations produces a single rescan.
    pub fn watch(platforms: &[PlatformConfig], sender: mpsc::Sender<WatchEvent>) -> Result<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    warn!("Library watch error: {err}");
                    return;
                }
            };
            if !is_library_change(&event) {
                return;
            }
            debug!("Library change: {:?}", event.paths);
            match sender.try_send(WatchEvent::LibraryChanged { paths: event.paths }) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => debug!("Library watch receiver closed"),
            }
        })
        .context("failed to create library watcher")?;

        let mut roots = Vec::new();
        for platform in platforms {
            for dir in platform.existing_directories() {
                if roots.contains(&dir) {
                    continue;
                }
                watcher
                    .watch(&dir, RecursiveMode::Recursive)
                    .with_context(|| format!("failed to watch {}", dir.display()))?;
                info!("Watching {} for {}", dir.display(), platform.name);
                roots.push(dir);
            }
        }

        Ok(Self {
            _watcher: watcher,
            roots,
        })
    }

    /// Directories being watched.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind, RenameMode};
    use std::{fs, path::Path, time::Duration};
    use tempfile::tempdir;

    fn mac(root: &Path) -> PlatformConfig {
        PlatformConfig {
            name: "Mac".to_string(),
            platform: None,
            game_directories: vec![root.to_path_buf(), root.join("missing")],
            game_type: "app".to_string(),
            command_template: "open \"%@\"".to_string(),
            bundle_extensions: vec!["app".to_string()],
        }
    }

    #[test]
    fn only_structural_changes_count() {
        let relevant = [
            EventKind::Create(CreateKind::Folder),
            EventKind::Remove(RemoveKind::File),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
        ];
        for kind in relevant {
            assert!(is_library_change(&Event::new(kind)), "{kind:?}");
        }

        let ignored = [
            EventKind::Access(AccessKind::Any),
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            EventKind::Any,
        ];
        for kind in ignored {
            assert!(!is_library_change(&Event::new(kind)), "{kind:?}");
        }
    }

    #[tokio::test]
    async fn installing_a_bundle_is_reported() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let (tx, mut rx) = mpsc::channel(1);
        let watcher = LibraryWatcher::watch(&[mac(dir.path())], tx)?;
        assert_eq!(watcher.roots(), &[dir.path().to_path_buf()]);

        fs::create_dir(dir.path().join("Celeste.app"))?;
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await?
            .expect("watch event");
        let WatchEvent::LibraryChanged { paths } = event;
        assert!(paths.iter().any(|p| p.ends_with("Celeste.app")));
        Ok(())
    }
}
