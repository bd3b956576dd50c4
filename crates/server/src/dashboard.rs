use crate::logging::preview;
use crate::subscription::TransportEvent;
use artidash_engine::{
    ApplyOutcome, CharacterProgress, ClampPolicy, Clock, ProgressInterpolator, Reconciler,
    Snapshot, StalePolicy,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardOptions {
    pub sample_interval: Duration,
    pub clamp: ClampPolicy,
    pub stale: StalePolicy,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(400),
            clamp: ClampPolicy::default(),
            stale: StalePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Open {
        epoch: u64,
        #[serde(with = "time::serde::rfc3339")]
        since: OffsetDateTime,
    },
    Retrying {
        error: String,
        #[serde(with = "time::serde::rfc3339")]
        since: OffsetDateTime,
    },
}

/// Everything the render layer gets, published as one immutable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub snapshot: Arc<Snapshot>,
    pub progress: BTreeMap<String, CharacterProgress>,
    /// Characters not re-sent since the last reconnect.
    pub stale: Vec<String>,
    pub connection: ConnectionStatus,
    pub dropped_messages: u64,
}

impl Default for DashboardView {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(Snapshot::default()),
            progress: BTreeMap::new(),
            stale: Vec::new(),
            connection: ConnectionStatus::Connecting,
            dropped_messages: 0,
        }
    }
}

/// Sole owner of the reconciler and the interpolator. Every mutation runs
/// to completion inside [`handle`](Self::handle) or [`tick`](Self::tick).
pub struct Dashboard {
    options: DashboardOptions,
    clock: Arc<dyn Clock>,
    reconciler: Reconciler,
    interpolator: ProgressInterpolator,
    connection: ConnectionStatus,
}

impl Dashboard {
    pub fn new(options: DashboardOptions, clock: Arc<dyn Clock>) -> Self {
        Self {
            options,
            clock,
            reconciler: Reconciler::new(options.stale),
            interpolator: ProgressInterpolator::new(options.clamp),
            connection: ConnectionStatus::Connecting,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn interpolator(&self) -> &ProgressInterpolator {
        &self.interpolator
    }

    pub fn connection(&self) -> &ConnectionStatus {
        &self.connection
    }

    /// Applies one transport event. Returns whether the view changed.
    pub fn handle(&mut self, event: TransportEvent) -> bool {
        let now = self.clock.now();
        match event {
            TransportEvent::Open => {
                let epoch = self.reconciler.note_connected();
                tracing::info!(epoch, "event stream open");
                self.connection = ConnectionStatus::Open { epoch, since: now };
                true
            }
            TransportEvent::Error(error) => {
                tracing::warn!(%error, "event stream error, waiting for reconnect");
                if matches!(self.connection, ConnectionStatus::Retrying { .. }) {
                    return false;
                }
                self.connection = ConnectionStatus::Retrying { error, since: now };
                true
            }
            TransportEvent::Message(body) => {
                let stale_before = self.reconciler.stale_names().len();
                match self.reconciler.apply_text(&body, now) {
                    Ok(ApplyOutcome::Changed {
                        snapshot,
                        character,
                        bank,
                    }) => {
                        tracing::debug!(rev = snapshot.rev, ?character, bank, "applied update");
                        self.interpolator.sync(&snapshot, now);
                        true
                    }
                    // A repeat still confirms the character for this epoch.
                    Ok(ApplyOutcome::Unchanged) => {
                        self.reconciler.stale_names().len() != stale_before
                    }
                    Err(error) => {
                        tracing::warn!(%error, body = %preview(&body), "dropping malformed message");
                        true
                    }
                }
            }
        }
    }

    /// One sampling pass: eviction, then progress.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        let evicted = self.reconciler.evict_stale(now);
        if !evicted.is_empty() {
            tracing::info!(?evicted, "evicted characters the producer stopped mentioning");
            self.interpolator.sync(self.reconciler.snapshot(), now);
        }
        self.interpolator.tick(self.reconciler.snapshot(), now);
    }

    pub fn view(&self) -> Arc<DashboardView> {
        Arc::new(DashboardView {
            snapshot: self.reconciler.current_snapshot(),
            progress: self.interpolator.all().clone(),
            stale: self.reconciler.stale_names(),
            connection: self.connection.clone(),
            dropped_messages: self.reconciler.dropped_messages(),
        })
    }

    /// Drives the dashboard until the event channel closes, publishing a
    /// fresh view after every event and every sampling tick.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<TransportEvent>,
        views: watch::Sender<Arc<DashboardView>>,
    ) {
        let mut ticker = tokio::time::interval(self.options.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        views.send_replace(self.view());

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if self.handle(event) {
                        views.send_replace(self.view());
                    }
                }
                _ = ticker.tick() => {
                    self.tick();
                    views.send_replace(self.view());
                }
            }
        }
        tracing::info!("event channel closed, dashboard loop stopping");
    }
}
