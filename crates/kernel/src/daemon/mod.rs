//! Long-running background mode.
//!
//! The daemon runs its jobs concurrently until SIGTERM or SIGINT arrives,
//! then asks every job to stop through a watch channel and gives them a
//! grace period before aborting whatever is left.

mod jobs;

pub use jobs::MigrationWatchJob;

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

/// Time jobs get to finish after shutdown was requested.
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// A cooperative background job.
///
/// Jobs should return soon after `shutdown` flips to `true`.
#[async_trait]
pub trait DaemonJob: Send {
    fn name(&self) -> &str;

    async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<()>;
}

/// Runs background jobs until told to stop.
pub struct Daemon {
    jobs: Vec<Box<dyn DaemonJob>>,
    grace: Duration,
}

impl Default for Daemon {
    fn default() -> Self {
        Self {
            jobs: Vec::new(),
            grace: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl Daemon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn add_job(&mut self, job: impl DaemonJob + 'static) {
        self.jobs.push(Box::new(job));
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Run until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<()> {
        let shutdown = shutdown_signal()?;
        self.run_until(shutdown).await
    }

    /// Run until `shutdown` completes or every job has finished.
    ///
    /// Without any jobs this idles until `shutdown` completes.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if self.jobs.is_empty() {
            info!("daemon started without jobs, waiting for shutdown");
            shutdown.await;
            info!("daemon stopped");
            return Ok(());
        }

        let grace = self.grace;
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut set = JoinSet::new();

        for mut job in self.jobs {
            let rx = stop_rx.clone();
            set.spawn(async move {
                let name = job.name().to_string();
                let result = job.run(rx).await;
                (name, result)
            });
        }
        info!(jobs = set.len(), "daemon started");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                joined = set.join_next() => match joined {
                    Some(joined) => report(joined),
                    None => {
                        info!("all daemon jobs finished");
                        return Ok(());
                    }
                },
            }
        }

        info!("shutting down daemon");
        let _ = stop_tx.send(true);

        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = set.join_next().await {
                report(joined);
            }
        })
        .await;

        if drained.is_err() {
            warn!(remaining = set.len(), "jobs did not stop in time, aborting them");
            set.abort_all();
            while set.join_next().await.is_some() {}
        }

        info!("daemon stopped");
        Ok(())
    }
}

fn report(joined: std::result::Result<(String, Result<()>), JoinError>) {
    match joined {
        Ok((name, Ok(()))) => info!(job = %name, "job finished"),
        Ok((name, Err(e))) => error!(job = %name, error = %format!("{e:#}"), "job failed"),
        Err(e) => error!(error = %e, "job panicked or was cancelled"),
    }
}

/// Resolves on the first SIGTERM or SIGINT.
pub fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    struct UntilStopped {
        stopped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl DaemonJob for UntilStopped {
        fn name(&self) -> &str {
            "until-stopped"
        }

        async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Stubborn;

    #[async_trait]
    impl DaemonJob for Stubborn {
        fn name(&self) -> &str {
            "stubborn"
        }

        async fn run(&mut self, _shutdown: watch::Receiver<bool>) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn jobs_stop_on_shutdown() {
        let stopped = Arc::new(AtomicBool::new(false));
        let mut daemon = Daemon::new();
        daemon.add_job(UntilStopped {
            stopped: Arc::clone(&stopped),
        });

        daemon
            .run_until(tokio::time::sleep(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stubborn_jobs_are_aborted() {
        let mut daemon = Daemon::new().with_grace_period(Duration::from_millis(20));
        daemon.add_job(Stubborn);
        let started = std::time::Instant::now();
        daemon.run_until(async {}).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn idles_without_jobs_until_shutdown() {
        let idle = tokio::time::timeout(
            Duration::from_millis(50),
            Daemon::new().run_until(std::future::pending()),
        )
        .await;
        assert!(idle.is_err());

        Daemon::new()
            .run_until(tokio::time::sleep(Duration::from_millis(10)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn returns_when_all_jobs_finish() {
        struct Quick;

        #[async_trait]
        impl DaemonJob for Quick {
            fn name(&self) -> &str {
                "quick"
            }

            async fn run(&mut self, _shutdown: watch::Receiver<bool>) -> Result<()> {
                Ok(())
            }
        }

        let mut daemon = Daemon::new();
        daemon.add_job(Quick);
        daemon.run_until(std::future::pending()).await.unwrap();
    }
}
