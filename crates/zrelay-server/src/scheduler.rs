use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant};
use zrelay_storage::{ConfigDefaults, Store};

use crate::poller::PollOrchestrator;

/// A replaceable poll timer. The cycle itself is spawned off the timer
/// task so a slow poll never stalls the ticker; overlap is handled by
/// the orchestrator's single-flight guard.
pub struct PollSchedule {
    handle: Option<JoinHandle<()>>,
    interval_minutes: i32,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl PollSchedule {
    pub fn new() -> Self {
        Self {
            handle: None,
            interval_minutes: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn interval_minutes(&self) -> i32 {
        self.interval_minutes
    }

    /// Starts (or restarts) the timer at the given interval. The first
    /// fire happens one full interval after the start.
    pub fn start(&mut self, minutes: i32, orchestrator: Arc<PollOrchestrator>) {
        self.stop();
        let minutes = minutes.clamp(1, 60);
        let period = Duration::from_secs(minutes as u64 * 60);
        let handle = tokio::spawn(async move {
            let mut tick = interval_at(Instant::now() + period, period);
            loop {
                tick.tick().await;
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move {
                    if let Err(e) = orchestrator.poll_now().await {
                        tracing::error!(error = %e, "Scheduled poll cycle failed");
                    }
                });
            }
        });
        self.handle = Some(handle);
        self.interval_minutes = minutes;
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.interval_minutes = 0;
    }

    pub fn replace(&mut self, minutes: i32, orchestrator: Arc<PollOrchestrator>) {
        self.start(minutes, orchestrator);
    }
}

/// Watches the monitoring config and keeps the poll timer in sync with
/// the configured interval and enabled flag.
pub struct PollScheduler {
    store: Arc<Store>,
    orchestrator: Arc<PollOrchestrator>,
    defaults: ConfigDefaults,
    refresh_secs: u64,
}

impl PollScheduler {
    pub fn new(
        store: Arc<Store>,
        orchestrator: Arc<PollOrchestrator>,
        defaults: ConfigDefaults,
        refresh_secs: u64,
    ) -> Self {
        Self {
            store,
            orchestrator,
            defaults,
            refresh_secs,
        }
    }

    pub async fn run(&self) {
        tracing::info!(refresh_secs = self.refresh_secs, "Poll scheduler started");
        let mut schedule = PollSchedule::new();
        let mut tick = interval(Duration::from_secs(self.refresh_secs.max(1)));
        loop {
            tick.tick().await;

            let config = match self
                .store
                .get_or_init_monitoring_config(&self.defaults)
                .await
            {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read monitoring config");
                    continue;
                }
            };

            if !config.enabled {
                if schedule.is_running() {
                    tracing::info!("Integration disabled, stopping poll timer");
                    schedule.stop();
                }
                continue;
            }

            let minutes = config.poll_interval_minutes.clamp(1, 60);
            if !schedule.is_running() || schedule.interval_minutes() != minutes {
                tracing::info!(interval_minutes = minutes, "(Re)starting poll timer");
                schedule.replace(minutes, self.orchestrator.clone());
            }
        }
    }
}
