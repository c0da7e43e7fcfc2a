//! Background tasks driving the scanner, the reconciler and presentation.
//!
//! Each task owns its loop and is stopped through its [`TaskHandle`]. Dropping
//! the handle stops the task too.

use crate::external::RenderSurface;
use crate::handoff::SessionHandoff;
use crate::presenter::Presenter;
use crate::reconcile::DeletionReconciler;
use crate::scanner::StoreScanner;
use crate::storage::StateStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Shortest accepted period; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Control over a spawned background task.
pub struct TaskHandle {
    name: String,
    trigger: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the job as soon as possible instead of waiting for the next tick.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Ask the task to stop after its current run.
    pub fn cancel(&self) {
        // Fails only when the task has already exited.
        let _ = self.shutdown.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel the task and wait for it to exit.
    pub async fn stop(self) {
        self.cancel();
        if let Err(e) = self.join.await {
            log::warn!("Task {} ended abnormally: {}", self.name, e);
        }
    }
}

/// Run `job` every `period`, first right away, until cancelled.
///
/// Runs never overlap: a run that outlasts the period delays the next one.
pub fn spawn_periodic<F, Fut>(name: impl Into<String>, period: Duration, mut job: F) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let name = name.into();
    let trigger = Arc::new(Notify::new());
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task_name = name.clone();
    let task_trigger = trigger.clone();
    let join = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period.max(MIN_PERIOD));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::debug!("Task {} started, every {:?}", task_name, period);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = task_trigger.notified() => {}
                _ = shutdown_rx.changed() => break,
            }
            if *shutdown_rx.borrow() {
                break;
            }
            job().await;
        }
        log::debug!("Task {} stopped", task_name);
    });

    TaskHandle {
        name,
        trigger,
        shutdown,
        join,
    }
}

/// Scan the external store every `period`.
pub fn spawn_scanner(scanner: Arc<StoreScanner>, period: Duration) -> TaskHandle {
    spawn_periodic("scanner", period, move || {
        let scanner = scanner.clone();
        async move {
            if let Err(e) = scanner.scan_and_merge().await {
                log::warn!("Scan failed: {}", e);
            }
        }
    })
}

/// Reconcile deletions on `surface` every `period`.
pub fn spawn_reconciler(
    reconciler: DeletionReconciler,
    surface: Arc<dyn RenderSurface>,
    store: Arc<dyn StateStore>,
    period: Duration,
) -> TaskHandle {
    let reconciler = Arc::new(Mutex::new(reconciler));
    spawn_periodic("reconciler", period, move || {
        let reconciler = reconciler.clone();
        let surface = surface.clone();
        let store = store.clone();
        async move {
            let mut reconciler = reconciler.lock().await;
            if let Err(e) = reconciler.poll(surface.as_ref(), store.as_ref()).await {
                log::warn!("Deletion reconcile failed: {}", e);
            }
        }
    })
}

/// Keep `surface` in step with the store: mount new screenshots whenever a
/// snapshot commits, and once at start.
pub fn spawn_presenter(
    mut presenter: Presenter,
    store: Arc<dyn StateStore>,
    surface: Arc<dyn RenderSurface>,
    handoff: Option<Arc<SessionHandoff>>,
) -> TaskHandle {
    let name = "presenter".to_string();
    let trigger = Arc::new(Notify::new());
    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let mut changes = store.subscribe();

    let task_trigger = trigger.clone();
    let join = tokio::spawn(async move {
        loop {
            if let Err(e) = presenter
                .refresh(store.as_ref(), surface.as_ref(), handoff.as_deref())
                .await
            {
                log::warn!("Presentation refresh failed: {}", e);
            }

            tokio::select! {
                received = changes.recv() => match received {
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        log::debug!("Presenter skipped {} snapshot(s)", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = task_trigger.notified() => {}
                _ = shutdown_rx.changed() => break,
            }
            if *shutdown_rx.borrow() {
                break;
            }
        }
        log::debug!("Task presenter stopped");
    });

    TaskHandle {
        name,
        trigger,
        shutdown,
        join,
    }
}
