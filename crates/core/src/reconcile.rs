//! Scan → dedup → resolve → commit.
//!
//! Names already present in the library when a run starts are skipped
//! without a lookup, whatever platform they came from. Two different games
//! sharing a display name therefore collide; this mirrors how the library
//! has always matched entries.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use tokio::{sync::Semaphore, task::JoinHandle, task::JoinSet, time::timeout};
use tracing::{debug, info, warn};

use crate::{
    catalog::{pick_match, CatalogError, CatalogRecord, CatalogResolver},
    config::{PlatformConfig, ReconcileConfig},
    discovery::{DiscoveredCandidate, Discovery, GameDiscovery},
    models::Game,
    store::GameStore,
};

/// Limits applied to catalog lookups during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Lookups allowed in flight at once.
    pub max_concurrent_lookups: usize,
    /// Time allowed per lookup; expiry counts as no match.
    pub lookup_timeout: Duration,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self::from(&ReconcileConfig::default())
    }
}

impl From<&ReconcileConfig> for ReconcileOptions {
    fn from(config: &ReconcileConfig) -> Self {
        Self {
            max_concurrent_lookups: config
                .max_concurrent_lookups
                .clamp(1, Semaphore::MAX_PERMITS),
            lookup_timeout: Duration::from_secs(config.lookup_timeout_secs.max(1)),
        }
    }
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Paths matched by the scanners.
    pub scanned: usize,
    /// Candidates extracted from those paths.
    pub candidates: usize,
    /// Candidates dropped because their name was already in the library.
    pub skipped_known: usize,
    /// Lookups that returned no exact-name match or timed out.
    pub unresolved: usize,
    /// Lookups that failed with an error.
    pub failed_lookups: usize,
    /// Names of the games committed by this run.
    pub added: Vec<String>,
}

/// Discovers installed games and commits catalog-confirmed ones to the store.
pub struct ReconciliationEngine<R> {
    store: GameStore,
    resolver: Arc<R>,
    platforms: Vec<PlatformConfig>,
    options: ReconcileOptions,
}

impl<R> Clone for ReconciliationEngine<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            resolver: Arc::clone(&self.resolver),
            platforms: self.platforms.clone(),
            options: self.options,
        }
    }
}

impl<R: CatalogResolver + 'static> ReconciliationEngine<R> {
    /// Build an engine over `platforms`.
    pub fn new(
        store: GameStore,
        resolver: Arc<R>,
        platforms: Vec<PlatformConfig>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            store,
            resolver,
            platforms,
            options,
        }
    }

    /// Run reconciliation in a background task.
    pub fn spawn(self) -> JoinHandle<RunReport> {
        tokio::spawn(async move { self.run().await })
    }

    /// Execute one full run.
    ///
    /// Dropping the returned future aborts any lookups still in flight.
    pub async fn run(&self) -> RunReport {
        let known = self.store.names();
        let platforms = self.platforms.clone();
        let scan = tokio::task::spawn_blocking(move || GameDiscovery::discover(&platforms));
        let discovery = match scan.await {
            Ok(discovery) => discovery,
            Err(err) => {
                warn!("Game discovery task failed: {err}");
                Discovery::default()
            }
        };

        let mut report = RunReport {
            scanned: discovery.scanned,
            candidates: discovery.candidates.len(),
            ..RunReport::default()
        };

        let groups = group_by_name(discovery.candidates, &known, &mut report);
        if groups.is_empty() {
            info!("Reconciliation found nothing new ({} known)", known.len());
            return report;
        }

        let confirmed = self.resolve(groups, &mut report).await;
        report.added = confirmed.iter().map(|game| game.name.clone()).collect();
        report.added.sort();
        let store = self.store.clone();
        if let Err(err) = tokio::task::spawn_blocking(move || store.upsert_many(confirmed)).await {
            warn!("Committing reconciled games failed: {err}");
        }

        info!(
            "Reconciliation added {} games ({} unresolved, {} failed lookups)",
            report.added.len(),
            report.unresolved,
            report.failed_lookups
        );
        report
    }

    async fn resolve(
        &self,
        groups: Vec<Vec<DiscoveredCandidate>>,
        report: &mut RunReport,
    ) -> Vec<Game> {
        let permits = Arc::new(Semaphore::new(self.options.max_concurrent_lookups));
        let mut tasks = JoinSet::new();
        for group in groups {
            let resolver = Arc::clone(&self.resolver);
            let permits = Arc::clone(&permits);
            let lookup_timeout = self.options.lookup_timeout;
            tasks.spawn(resolve_group(resolver, permits, group, lookup_timeout));
        }

        let mut confirmed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    report.unresolved += outcome.unresolved;
                    report.failed_lookups += outcome.failed;
                    confirmed.extend(outcome.game);
                }
                Err(err) => warn!("Catalog lookup task failed: {err}"),
            }
        }
        confirmed
    }
}

/// Drop known names and bundle the rest by name, keeping discovery order.
fn group_by_name(
    candidates: Vec<DiscoveredCandidate>,
    known: &HashSet<String>,
    report: &mut RunReport,
) -> Vec<Vec<DiscoveredCandidate>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<DiscoveredCandidate>> = Vec::new();
    for candidate in candidates {
        if known.contains(&candidate.name) {
            debug!("{} already in library", candidate.name);
            report.skipped_known += 1;
            continue;
        }
        match index.get(&candidate.name) {
            Some(&slot) => groups[slot].push(candidate),
            None => {
                index.insert(candidate.name.clone(), groups.len());
                groups.push(vec![candidate]);
            }
        }
    }
    groups
}

#[derive(Debug, Default)]
struct GroupOutcome {
    game: Option<Game>,
    unresolved: usize,
    failed: usize,
}

/// Try each candidate sharing a name until one is confirmed.
async fn resolve_group<R: CatalogResolver>(
    resolver: Arc<R>,
    permits: Arc<Semaphore>,
    group: Vec<DiscoveredCandidate>,
    lookup_timeout: Duration,
) -> GroupOutcome {
    let mut outcome = GroupOutcome::default();
    for candidate in group {
        let answer = {
            let _permit = match permits.acquire().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            timeout(lookup_timeout, lookup(resolver.as_ref(), &candidate)).await
        };

        let record = match answer {
            Ok(Ok(records)) => pick_match(&records, &candidate.name).cloned(),
            Ok(Err(err)) => {
                warn!("Catalog lookup for {} failed: {err}", candidate.name);
                outcome.failed += 1;
                continue;
            }
            Err(_) => {
                debug!("Catalog lookup for {} timed out", candidate.name);
                None
            }
        };

        match record {
            Some(record) => {
                info!("Confirmed {} (catalog id {})", candidate.name, record.igdb_id);
                outcome.game = Some(candidate.into_game(&record));
                break;
            }
            None => {
                debug!("No catalog match for {}", candidate.name);
                outcome.unresolved += 1;
            }
        }
    }
    outcome
}

async fn lookup<R: CatalogResolver>(
    resolver: &R,
    candidate: &DiscoveredCandidate,
) -> Result<Vec<CatalogRecord>, CatalogError> {
    match candidate.steam_id() {
        Some(steam_id) => resolver.resolve_by_id(steam_id).await,
        None => resolver.resolve_by_name(&candidate.name).await,
    }
}
