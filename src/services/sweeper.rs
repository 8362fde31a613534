//! Periodic retention sweep.
//!
//! Each pass re-evaluates every stored record independently, so overlapping
//! or repeated passes are idempotent. Per-record failures are logged and the
//! pass continues; only a failed store scan aborts a pass (the next tick
//! retries).

use crate::config::AppConfig;
use crate::models::record::Record;
use crate::services::record_store::RecordStore;
use crate::services::retention;
use chrono::Utc;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, error, info, warn};

/// Outcome counters for one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub scanned: usize,
    pub expired: usize,
    /// Records dropped because their backing file had already vanished.
    pub healed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Sweeper {
    store: Arc<dyn RecordStore>,
    config: Arc<AppConfig>,
}

impl Sweeper {
    pub fn new(store: Arc<dyn RecordStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// Tick forever on a fixed period. Spawned once from `main`; a slow pass
    /// simply delays the next tick.
    pub async fn run(self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let stats = self.sweep().await;
            if stats.scanned > 0 || stats.failed > 0 {
                info!(
                    scanned = stats.scanned,
                    expired = stats.expired,
                    healed = stats.healed,
                    failed = stats.failed,
                    "retention sweep finished"
                );
            }
        }
    }

    /// One full pass over the store. No-op when retention is disabled.
    pub async fn sweep(&self) -> SweepStats {
        let mut stats = SweepStats::default();
        if !self.config.retention_enabled {
            return stats;
        }

        let entries = match self.store.list_all().await {
            Ok(entries) => entries,
            Err(err) => {
                error!("retention: listing records failed: {err}");
                stats.failed += 1;
                return stats;
            }
        };
        if entries.is_empty() {
            return stats;
        }
        debug!("retention: checking {} records", entries.len());

        let now_ms = Utc::now().timestamp_millis();
        for (key, record) in entries {
            stats.scanned += 1;

            // Short links own no file and never expire implicitly.
            let Some(path) = record.file_path() else {
                continue;
            };

            let size_bytes = match fs::metadata(path).await {
                Ok(meta) => meta.len(),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    match self.store.delete(&key).await {
                        Ok(()) => {
                            warn!(
                                "retention: dropped `{key}`, backing file {} already missing",
                                path.display()
                            );
                            stats.healed += 1;
                        }
                        Err(err) => {
                            error!("retention: failed to drop stale record `{key}`: {err}");
                            stats.failed += 1;
                        }
                    }
                    continue;
                }
                Err(err) => {
                    error!("retention: could not stat {}: {err}", path.display());
                    stats.failed += 1;
                    continue;
                }
            };

            if !self.is_expired(&record, size_bytes, now_ms) {
                continue;
            }

            info!("retention: deleting `{key}`");
            // Store entry first: a failed unlink then orphans a file, which
            // is harmless, instead of leaving a live record pointing at a
            // path scheduled for removal.
            if let Err(err) = self.store.delete(&key).await {
                error!("retention: failed to delete record `{key}`: {err}");
                stats.failed += 1;
                continue;
            }
            match fs::remove_file(path).await {
                Ok(()) => stats.expired += 1,
                Err(err) if err.kind() == ErrorKind::NotFound => stats.expired += 1,
                Err(err) => {
                    error!(
                        "retention: record `{key}` deleted but unlinking {} failed: {err}",
                        path.display()
                    );
                    stats.failed += 1;
                }
            }
        }
        stats
    }

    fn is_expired(&self, record: &Record, size_bytes: u64, now_ms: i64) -> bool {
        // An explicit deadline overrides the curve in both directions.
        if let Some(deadline) = record.expires_at {
            return now_ms >= deadline;
        }
        let cap = self.config.size_cap_bytes(record.privileged);
        match retention::max_age_days(
            size_bytes,
            self.config.retention_min_age_days,
            self.config.retention_max_age_days,
            cap,
        ) {
            Some(max_age) => retention::age_days(now_ms, record.created_at) > max_age,
            None => false,
        }
    }
}
