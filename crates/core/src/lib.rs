#![warn(clippy::all, missing_docs)]

//! Core domain logic for the pyre game launcher.
//!
//! This crate hosts the data models, configuration handling, installed-game
//! discovery, catalog resolution, and the persisted library store used by
//! the command-line frontend and any future ones.

pub mod catalog;
pub mod config;
pub mod discovery;
pub mod launch;
pub mod manifest;
pub mod models;
pub mod reconcile;
pub mod store;
pub mod watch;

pub use catalog::{CatalogError, CatalogRecord, CatalogResolver, HttpCatalog};
pub use config::{AppConfig, PlatformConfig};
pub use discovery::{DirectoryScanner, DiscoveredCandidate, GameDiscovery, MatchRule};
pub use launch::{play, LaunchError};
pub use manifest::AppManifest;
pub use models::{Flag, Game, GameEdit, GameId, Platform, Recency, Status};
pub use reconcile::{ReconcileOptions, ReconciliationEngine, RunReport};
pub use store::{GameStore, JsonFileStorage, LibraryStorage, StoreEvent};
pub use watch::{LibraryWatcher, WatchEvent};
