// Mobility screen - UI-owned loop driving aggregation, live updates and charts
use crate::application::anchor_store::AnchorStore;
use crate::application::chart_presenter;
use crate::application::clock::Clock;
use crate::application::health_store::HealthStore;
use crate::application::live_update_watcher::{
    LiveUpdateWatcher, SamplesObserved, WatchHandle, WatcherState,
};
use crate::application::sample_sync::SampleSync;
use crate::application::statistics_aggregator::{QueryCompletion, StatisticsAggregator};
use crate::application::time_range_resolver::TimeWindow;
use crate::domain::chart::{ChartDisplayModel, Dashboard, MetricSeries};
use crate::domain::metric::MetricKind;
use crate::domain::time_range::TimeRange;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinSet};

const COMMAND_BUFFER: usize = 32;
const OBSERVED_BUFFER: usize = 16;

/// Collaborators owned by one screen for its whole lifetime.
#[derive(Clone)]
pub struct ScreenContext {
    pub store: Arc<dyn HealthStore>,
    pub anchors: Arc<dyn AnchorStore>,
    pub sync: Arc<dyn SampleSync>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug)]
pub enum ScreenCommand {
    Appear,
    SelectRange(TimeRange),
    Refresh,
    WatcherStates(oneshot::Sender<Vec<(MetricKind, WatcherState)>>),
    Shutdown,
}

#[derive(Debug, Error)]
#[error("mobility screen has shut down")]
pub struct ScreenClosed;

/// Cloneable handle used by everything outside the screen loop.
#[derive(Clone)]
pub struct ScreenHandle {
    commands: mpsc::Sender<ScreenCommand>,
    dashboard: watch::Receiver<Dashboard>,
}

impl ScreenHandle {
    async fn send(&self, command: ScreenCommand) -> Result<(), ScreenClosed> {
        self.commands.send(command).await.map_err(|_| ScreenClosed)
    }

    /// Request authorization and, once granted, start watchers and load data.
    pub async fn appear(&self) -> Result<(), ScreenClosed> {
        self.send(ScreenCommand::Appear).await
    }

    pub async fn select_range(&self, range: TimeRange) -> Result<(), ScreenClosed> {
        self.send(ScreenCommand::SelectRange(range)).await
    }

    pub async fn refresh(&self) -> Result<(), ScreenClosed> {
        self.send(ScreenCommand::Refresh).await
    }

    pub async fn shutdown(&self) -> Result<(), ScreenClosed> {
        self.send(ScreenCommand::Shutdown).await
    }

    pub async fn watcher_states(&self) -> Result<Vec<(MetricKind, WatcherState)>, ScreenClosed> {
        let (tx, rx) = oneshot::channel();
        self.send(ScreenCommand::WatcherStates(tx)).await?;
        rx.await.map_err(|_| ScreenClosed)
    }

    /// Latest published snapshot.
    pub fn dashboard(&self) -> Dashboard {
        self.dashboard.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Dashboard> {
        self.dashboard.clone()
    }
}

pub struct MobilityScreen {
    context: ScreenContext,
    aggregator: StatisticsAggregator,
    metrics: Vec<MetricKind>,
    selected_range: TimeRange,
    window: TimeWindow,
    authorized: Option<bool>,
    series: HashMap<MetricKind, MetricSeries>,
    charts: HashMap<MetricKind, ChartDisplayModel>,
    /// Footer label of each metric's last applied result.
    updated: HashMap<MetricKind, String>,
    generations: HashMap<MetricKind, u64>,
    in_flight: HashMap<MetricKind, AbortHandle>,
    queries: JoinSet<QueryCompletion>,
    watchers: Vec<WatchHandle>,
    observed_tx: mpsc::Sender<SamplesObserved>,
    observed_rx: mpsc::Receiver<SamplesObserved>,
    dashboard: watch::Sender<Dashboard>,
    revision: u64,
}

impl MobilityScreen {
    /// Start the screen loop on its own task.
    pub fn spawn(context: ScreenContext, metrics: Vec<MetricKind>, range: TimeRange) -> ScreenHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let screen = Self::new(context, metrics, range);
        let dashboard = screen.dashboard.subscribe();

        tokio::spawn(screen.run(commands_rx));

        ScreenHandle {
            commands: commands_tx,
            dashboard,
        }
    }

    fn new(context: ScreenContext, metrics: Vec<MetricKind>, range: TimeRange) -> Self {
        let window = TimeWindow::resolve(range, context.clock.now());
        let (observed_tx, observed_rx) = mpsc::channel(OBSERVED_BUFFER);
        let (dashboard, _) = watch::channel(Dashboard::new(range, Vec::new(), 0, 0));

        let mut screen = Self {
            aggregator: StatisticsAggregator::new(context.store.clone()),
            context,
            series: metrics
                .iter()
                .map(|m| (*m, MetricSeries::empty(m.identifier())))
                .collect(),
            metrics,
            selected_range: range,
            window,
            authorized: None,
            charts: HashMap::new(),
            updated: HashMap::new(),
            generations: HashMap::new(),
            in_flight: HashMap::new(),
            queries: JoinSet::new(),
            watchers: Vec::new(),
            observed_tx,
            observed_rx,
            dashboard,
            revision: 0,
        };
        screen.present_all();
        screen.publish();
        screen
    }

    async fn run(mut self, mut commands: mpsc::Receiver<ScreenCommand>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ScreenCommand::Shutdown) | None => break,
                    Some(command) => self.handle(command).await,
                },
                Some(joined) = self.queries.join_next(), if !self.queries.is_empty() => match joined {
                    Ok(completion) => self.apply_completion(completion),
                    Err(e) if e.is_cancelled() => tracing::debug!("Superseded aggregation task cancelled"),
                    Err(e) => tracing::error!("Aggregation task failed: {}", e),
                },
                Some(observed) = self.observed_rx.recv() => {
                    if observed.added + observed.deleted > 0 {
                        tracing::debug!("{} changed, reloading charts", observed.metric);
                        self.load_data();
                    }
                }
            }
        }

        self.teardown();
    }

    async fn handle(&mut self, command: ScreenCommand) {
        match command {
            ScreenCommand::Appear => self.appear().await,
            ScreenCommand::SelectRange(range) => {
                tracing::info!("Selected range {}", range);
                self.selected_range = range;
                if self.authorized == Some(true) {
                    self.load_data();
                } else {
                    self.window = TimeWindow::resolve(range, self.context.clock.now());
                    self.present_all();
                    self.publish();
                }
            }
            ScreenCommand::Refresh => {
                if self.authorized == Some(true) {
                    self.load_data();
                } else {
                    self.publish();
                }
            }
            ScreenCommand::WatcherStates(reply) => {
                let states = self
                    .watchers
                    .iter()
                    .map(|w| (w.metric(), w.state()))
                    .collect();
                let _ = reply.send(states);
            }
            ScreenCommand::Shutdown => {}
        }
    }

    async fn appear(&mut self) {
        if self.authorized == Some(true) {
            return;
        }

        match self.context.store.request_authorization(&self.metrics).await {
            Ok(true) => {
                tracing::info!("Health data access granted for {} metrics", self.metrics.len());
                self.authorized = Some(true);
                self.start_watchers();
                self.load_data();
            }
            Ok(false) => {
                tracing::info!("Health data access declined");
                self.authorized = Some(false);
            }
            Err(e) => tracing::error!("Health data authorization failed: {}", e),
        }
    }

    fn start_watchers(&mut self) {
        let watcher = LiveUpdateWatcher::new(
            self.context.store.clone(),
            self.context.anchors.clone(),
            self.context.sync.clone(),
        )
        .with_handoff(self.observed_tx.clone());

        let predicate = self.window.predicate();
        self.watchers = self
            .metrics
            .iter()
            .map(|metric| watcher.watch(*metric, predicate))
            .collect();
    }

    /// Issue one query per metric, superseding anything still in flight.
    fn load_data(&mut self) {
        self.window = TimeWindow::resolve(self.selected_range, self.context.clock.now());

        for metric in &self.metrics {
            let generation = self.generations.entry(*metric).or_default();
            *generation += 1;

            if let Some(previous) = self.in_flight.remove(metric) {
                previous.abort();
            }

            let query = self.aggregator.query(*metric, self.window.clone(), *generation);
            let handle = self.queries.spawn(query);
            self.in_flight.insert(*metric, handle);
        }

        self.publish();
    }

    fn apply_completion(&mut self, completion: QueryCompletion) {
        let metric = completion.metric;
        let current = self.generations.get(&metric).copied().unwrap_or_default();
        if completion.generation != current {
            tracing::debug!(
                "Discarding stale {} result for {} (generation {} < {})",
                completion.range,
                metric,
                completion.generation,
                current
            );
            return;
        }

        self.in_flight.remove(&metric);
        match completion.result {
            Ok(series) => {
                self.series.insert(metric, series);
                self.updated.insert(metric, self.window.last_updated_label());
                self.present(metric);
            }
            Err(e) => tracing::warn!("Keeping previous {} chart: {}", metric, e),
        }
        self.publish();
    }

    fn present(&mut self, metric: MetricKind) {
        let Some(series) = self.series.get(&metric) else {
            return;
        };
        let model = chart_presenter::present(
            series,
            self.window.axis_markers(),
            self.window.date_range_label(),
            self.updated.get(&metric).cloned(),
        );
        self.charts.insert(metric, model);
    }

    fn present_all(&mut self) {
        for metric in self.metrics.clone() {
            self.present(metric);
        }
    }

    fn publish(&mut self) {
        self.revision += 1;
        let charts = self
            .metrics
            .iter()
            .filter_map(|m| self.charts.get(m).cloned())
            .collect();
        let snapshot = Dashboard::new(self.selected_range, charts, self.revision, self.in_flight.len());
        self.dashboard.send_replace(snapshot);
    }

    fn teardown(&mut self) {
        tracing::info!("Mobility screen closing");
        self.queries.abort_all();
        self.in_flight.clear();
        for watcher in &self.watchers {
            watcher.stop();
        }
        self.watchers.clear();
    }
}
