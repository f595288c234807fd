use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::DaemonJob;
use crate::migration::MigrationManager;

/// Shortest interval between rescans.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically rescans for pending migrations and reports them.
pub struct MigrationWatchJob {
    manager: MigrationManager,
    interval: Duration,
}

impl MigrationWatchJob {
    /// Intervals below one second are raised to one second.
    pub fn new(manager: MigrationManager, interval: Duration) -> Self {
        Self {
            manager,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    async fn check(&mut self) {
        self.manager.refresh().await;

        if self.manager.has_pending_migrations() {
            let modules: Vec<String> = self
                .manager
                .pending()
                .map(|m| m.module_name().to_string())
                .collect();
            warn!(
                count = self.manager.count(),
                modules = ?modules,
                "database migrations are pending"
            );
        } else {
            debug!("no pending database migrations");
        }
    }
}

#[async_trait]
impl DaemonJob for MigrationWatchJob {
    fn name(&self) -> &str {
        "migration-watch"
    }

    async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        info!(interval_secs = self.interval.as_secs(), "watching for pending migrations");

        loop {
            tokio::select! {
                _ = ticker.tick() => self.check().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("migration watch stopping");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}
