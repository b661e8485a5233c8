//! The play action.

use std::io;

use thiserror::Error;
use tokio::{process::Command, task::JoinError};
use tracing::info;

use crate::{
    models::{today, Game, GameId},
    store::GameStore,
};

/// Errors raised when starting a game.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// No entry with this id in the library.
    #[error("no game with id {0}")]
    UnknownGame(GameId),
    /// The entry has an empty launcher.
    #[error("{0} has no launcher configured")]
    NotConfigured(String),
    /// Recording the play did not complete.
    #[error("failed to record play: {0}")]
    Record(#[from] JoinError),
    /// The shell could not be started.
    #[error("failed to launch {name}: {source}")]
    Spawn {
        /// Game being launched.
        name: String,
        /// Underlying spawn error.
        source: io::Error,
    },
}

/// Record a play of `id`, then start its launcher without waiting for it.
///
/// The play is recorded even when the launcher turns out to be missing.
/// The library write happens on the blocking pool.
pub async fn play(store: &GameStore, id: GameId) -> Result<Game, LaunchError> {
    let recorder = store.clone();
    let game = tokio::task::spawn_blocking(move || recorder.record_played(id, today()))
        .await?
        .ok_or(LaunchError::UnknownGame(id))?;
    if !game.has_launcher() {
        return Err(LaunchError::NotConfigured(game.name));
    }

    info!("Launching {}: {}", game.name, game.launcher);
    shell(&game.launcher)
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            name: game.name.clone(),
            source,
        })?;
    Ok(game)
}

#[cfg(windows)]
fn shell(launcher: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(launcher);
    command
}

#[cfg(not(windows))]
fn shell(launcher: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(launcher);
    command
}
