//! Finding installed games on disk.

/// Candidate extraction from scanned paths and manifests.
pub mod candidate;
/// Directory traversal with per-platform match rules.
pub mod scanner;

pub use candidate::{extract_candidates, DiscoveredCandidate, Discovery, GameDiscovery, Locator};
pub use scanner::{DirectoryScanner, MatchRule};
