//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Pipeline (cycles, torrent state transitions)
//! - Feed fetching
//! - Classification and hardlinking

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Pipeline cycles run total.
pub static CYCLES_RUN: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("gleaner_cycles_total", "Total pipeline cycles run").unwrap());

/// Cycle duration in seconds.
pub static CYCLE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "gleaner_cycle_duration_seconds",
            "Duration of pipeline cycles",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
    )
    .unwrap()
});

/// New torrents discovered from sources.
pub static TORRENTS_DISCOVERED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gleaner_torrents_discovered_total",
        "Total new torrents discovered from sources",
    )
    .unwrap()
});

/// Torrents handed to the download client.
pub static TORRENTS_ADDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gleaner_torrents_added_total",
        "Total torrents added to the download client",
    )
    .unwrap()
});

/// Torrents that reached completion.
pub static TORRENTS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gleaner_torrents_completed_total",
        "Total torrents that finished downloading",
    )
    .unwrap()
});

/// Torrents that failed.
pub static TORRENTS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("gleaner_torrents_failed_total", "Total torrents that failed").unwrap()
});

// =============================================================================
// Feed Metrics
// =============================================================================

/// Feed fetches total by result.
pub static FEED_FETCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gleaner_feed_fetches_total", "Total feed fetches"),
        &["result"], // "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Classification and Library Metrics
// =============================================================================

/// Classifier fallbacks from the LLM strategy to rules.
pub static CLASSIFIER_FALLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gleaner_classifier_fallbacks_total",
            "Total LLM classifier calls that fell back to rules",
        ),
        &["operation"], // "importance", "episode"
    )
    .unwrap()
});

/// Hardlinks total by result.
pub static HARDLINKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("gleaner_hardlinks_total", "Total hardlink attempts"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Pipeline
        Box::new(CYCLES_RUN.clone()),
        Box::new(CYCLE_DURATION.clone()),
        Box::new(TORRENTS_DISCOVERED.clone()),
        Box::new(TORRENTS_ADDED.clone()),
        Box::new(TORRENTS_COMPLETED.clone()),
        Box::new(TORRENTS_FAILED.clone()),
        // Feeds
        Box::new(FEED_FETCHES.clone()),
        // Classification and library
        Box::new(CLASSIFIER_FALLBACKS.clone()),
        Box::new(HARDLINKS_TOTAL.clone()),
    ]
}
