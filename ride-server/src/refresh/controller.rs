//! The refresh worker and its handle.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::config::RefreshConfig;
use crate::backend::with_retry;
use crate::realtime::{ChangeBus, ChangeEvent, ChangeInterest};

/// A source of data the controller keeps fresh.
pub trait Fetch: Send + Sync + 'static {
    type Params: Clone + Send + Sync + 'static;
    type Output: Send + Sync + 'static;
    type Error: fmt::Display + Send + 'static;

    fn fetch(
        &self,
        params: &Self::Params,
    ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;

    /// Whether a failure is worth retrying before it is surfaced.
    fn is_transient(&self, _error: &Self::Error) -> bool {
        false
    }
}

/// The last applied result.
#[derive(Debug)]
pub struct View<T> {
    /// Incremented once per applied fetch, success or failure
    pub generation: u64,
    /// Most recent successful result; kept across failures
    pub value: Option<Arc<T>>,
    /// Message from the most recent fetch, if it failed
    pub error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl<T> View<T> {
    pub fn is_loaded(&self) -> bool {
        self.value.is_some()
    }
}

impl<T> Default for View<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            value: None,
            error: None,
            refreshed_at: None,
        }
    }
}

impl<T> Clone for View<T> {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            value: self.value.clone(),
            error: self.error.clone(),
            refreshed_at: self.refreshed_at,
        }
    }
}

/// Change notifications the controller listens to.
pub struct ChangeSource {
    rx: broadcast::Receiver<Arc<ChangeEvent>>,
    interests: Vec<ChangeInterest>,
}

impl ChangeSource {
    pub fn new(bus: &ChangeBus, interest: ChangeInterest) -> Self {
        Self::any(bus, [interest])
    }

    /// Listen for events matching any of `interests`.
    pub fn any(bus: &ChangeBus, interests: impl IntoIterator<Item = ChangeInterest>) -> Self {
        Self {
            rx: bus.subscribe(),
            interests: interests.into_iter().collect(),
        }
    }

    fn is_relevant(&self, event: &ChangeEvent) -> bool {
        self.interests.iter().any(|i| i.matches(event))
    }
}

/// Serialises publication against teardown.
#[derive(Default)]
struct Gate {
    closed: Mutex<bool>,
}

/// Owns every fetch for one view.
///
/// Triggers are the initial fetch on spawn, the periodic interval, explicit
/// [`RefreshHandle::refresh`] calls, relevant change events and new
/// parameters. New parameters abandon an in-flight fetch and start over.
/// Any other trigger arriving mid-fetch lets the fetch publish and then
/// runs one follow-up, however many triggers arrived.
pub struct RefreshController<F: Fetch> {
    fetcher: F,
    config: RefreshConfig,
    params: watch::Receiver<F::Params>,
    view: watch::Sender<View<F::Output>>,
    trigger: Arc<Notify>,
    changes: Option<ChangeSource>,
    gate: Arc<Gate>,
    cancel: CancellationToken,
}

impl<F: Fetch> RefreshController<F> {
    /// Start the worker. The first fetch begins immediately.
    pub fn spawn(
        fetcher: F,
        params: F::Params,
        config: RefreshConfig,
        changes: Option<ChangeSource>,
    ) -> RefreshHandle<F> {
        let (params_tx, params_rx) = watch::channel(params);
        let (view_tx, view_rx) = watch::channel(View::default());
        let trigger = Arc::new(Notify::new());
        let gate = Arc::new(Gate::default());
        let cancel = CancellationToken::new();

        let controller = Self {
            fetcher,
            config,
            params: params_rx,
            view: view_tx,
            trigger: Arc::clone(&trigger),
            changes,
            gate: Arc::clone(&gate),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(controller.run());

        RefreshHandle {
            params: params_tx,
            view: view_rx,
            trigger,
            gate,
            cancel,
            task,
        }
    }

    async fn run(mut self) {
        let period = self.config.interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut due = true;
        'worker: loop {
            if !due {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break 'worker,
                    changed = self.params.changed() => {
                        if changed.is_err() {
                            break 'worker;
                        }
                    }
                    _ = self.trigger.notified() => {}
                    _ = interval.tick() => {}
                    _ = next_relevant(&mut self.changes) => {}
                }
            }
            due = false;

            let params = self.params.borrow_and_update().clone();
            let fetcher = &self.fetcher;
            let params = &params;
            let fetch = with_retry(
                self.config.retry,
                move |e| fetcher.is_transient(e),
                move || fetcher.fetch(params),
            );
            tokio::pin!(fetch);

            // Only new parameters abandon the fetch; other triggers queue one follow-up.
            let mut pending = false;
            let result = loop {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break 'worker,
                    changed = self.params.changed() => {
                        if changed.is_err() {
                            break 'worker;
                        }
                        tracing::debug!("refresh superseded by new parameters");
                        due = true;
                        continue 'worker;
                    }
                    result = &mut fetch => break result,
                    _ = self.trigger.notified() => pending = true,
                    _ = interval.tick() => pending = true,
                    _ = next_relevant(&mut self.changes) => pending = true,
                }
            };

            self.apply(result);
            if pending {
                tracing::debug!("running queued refresh");
                due = true;
            }
        }

        tracing::debug!("refresh worker stopped");
    }

    fn apply(&self, result: Result<F::Output, F::Error>) {
        let closed = self.gate.closed.lock().unwrap_or_else(PoisonError::into_inner);
        if *closed || self.cancel.is_cancelled() {
            return;
        }

        let now = Utc::now();
        match result {
            Ok(value) => self.view.send_modify(|view| {
                view.generation += 1;
                view.value = Some(Arc::new(value));
                view.error = None;
                view.refreshed_at = Some(now);
            }),
            Err(e) => {
                tracing::warn!(error = %e, "refresh failed, keeping previous result");
                self.view.send_modify(|view| {
                    view.generation += 1;
                    view.error = Some(e.to_string());
                    view.refreshed_at = Some(now);
                });
            }
        }
    }
}

/// Resolves when a relevant change arrives; never, if there is no source.
async fn next_relevant(changes: &mut Option<ChangeSource>) {
    loop {
        let Some(source) = changes.as_mut() else {
            return std::future::pending().await;
        };
        match source.rx.recv().await {
            Ok(event) if source.is_relevant(&event) => return,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "change notifications lagged, refreshing");
                return;
            }
            Err(RecvError::Closed) => {
                tracing::debug!("change source closed");
                *changes = None;
            }
        }
    }
}

/// Control surface for a running [`RefreshController`].
///
/// Dropping the handle tears the worker down.
pub struct RefreshHandle<F: Fetch> {
    params: watch::Sender<F::Params>,
    view: watch::Receiver<View<F::Output>>,
    trigger: Arc<Notify>,
    gate: Arc<Gate>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl<F: Fetch> RefreshHandle<F> {
    /// Request a refresh with the current parameters.
    pub fn refresh(&self) {
        self.trigger.notify_one();
    }

    /// Replace the parameters and refresh, abandoning any in-flight fetch.
    pub fn set_params(&self, params: F::Params) {
        self.params.send_replace(params);
    }

    pub fn params(&self) -> F::Params {
        self.params.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<View<F::Output>> {
        self.view.clone()
    }

    pub fn current(&self) -> View<F::Output> {
        self.view.borrow().clone()
    }

    /// Stop the worker. Nothing is published after this returns.
    pub fn shutdown(&self) {
        let mut closed = self.gate.closed.lock().unwrap_or_else(PoisonError::into_inner);
        *closed = true;
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<F: Fetch> Drop for RefreshHandle<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
