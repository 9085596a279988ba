//! Per-user event dispatcher
//!
//! Each user gets one worker task fed by a bounded channel. Events of one
//! user are handled strictly in arrival order; different users run
//! concurrently. Enqueueing never waits, so one busy user cannot stall the
//! receive loop for everybody else.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::connector::InboundEvent;
use crate::controller::Controller;

/// Queue depth per user
const WORKER_CAPACITY: usize = 32;

/// Time without new events after which a worker is retired
const WORKER_IDLE: Duration = Duration::from_secs(600);

/// Something that processes one event to completion
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: InboundEvent);
}

#[async_trait]
impl EventHandler for Controller {
    async fn handle(&self, event: InboundEvent) {
        Controller::handle(self, event).await
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The user's queue is full; the event was dropped
    #[error("event queue full for user {0}")]
    Busy(i64),
}

impl DispatchError {
    pub fn user_message(&self) -> String {
        match self {
            DispatchError::Busy(_) => "Слишком много сообщений, дождитесь ответа на предыдущие.".to_string(),
        }
    }
}

struct Worker {
    tx: mpsc::Sender<InboundEvent>,
    handle: JoinHandle<()>,
    last_event: Instant,
}

pub struct Dispatcher {
    handler: Arc<dyn EventHandler>,
    workers: HashMap<i64, Worker>,
    /// Workers whose sender was dropped but which may still be draining
    retiring: HashMap<i64, JoinHandle<()>>,
    idle: Duration,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn EventHandler>) -> Self {
        Self {
            handler,
            workers: HashMap::new(),
            retiring: HashMap::new(),
            idle: WORKER_IDLE,
        }
    }

    /// Override the idle timeout of workers
    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// Queue an event on its user's worker, spawning one if needed
    ///
    /// Never waits: a full queue rejects the event with [`DispatchError::Busy`].
    pub fn dispatch(&mut self, event: InboundEvent) -> Result<(), DispatchError> {
        let user_id = event.user_id;
        debug!(%user_id, "dispatch: called");
        self.retire_idle();

        let mut event = event;
        if let Some(worker) = self.workers.get_mut(&user_id) {
            match worker.tx.try_send(event) {
                Ok(()) => {
                    worker.last_event = Instant::now();
                    return Ok(());
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(%user_id, "dispatch: queue full, dropping event");
                    return Err(DispatchError::Busy(user_id));
                }
                Err(mpsc::error::TrySendError::Closed(returned)) => {
                    debug!(%user_id, "dispatch: worker gone, respawning");
                    event = returned;
                    if let Some(dead) = self.workers.remove(&user_id) {
                        self.retiring.insert(user_id, dead.handle);
                    }
                }
            }
        }

        let worker = self.spawn_worker(user_id);
        if worker.tx.try_send(event).is_err() {
            warn!(%user_id, "dispatch: fresh worker rejected event");
        }
        self.workers.insert(user_id, worker);
        Ok(())
    }

    /// Number of workers accepting events
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Drop the senders of idle workers and forget finished ones
    ///
    /// A retired worker drains what is already queued and exits.
    fn retire_idle(&mut self) {
        self.retiring.retain(|_, handle| !handle.is_finished());

        let idle = self.idle;
        let expired: Vec<i64> = self
            .workers
            .iter()
            .filter(|(_, w)| w.tx.is_closed() || w.last_event.elapsed() >= idle)
            .map(|(user_id, _)| *user_id)
            .collect();
        for user_id in expired {
            if let Some(worker) = self.workers.remove(&user_id) {
                debug!(%user_id, "retire_idle: retiring worker");
                self.retiring.insert(user_id, worker.handle);
            }
        }
    }

    fn spawn_worker(&mut self, user_id: i64) -> Worker {
        info!(%user_id, "Spawning session worker");
        let (tx, rx) = mpsc::channel(WORKER_CAPACITY);
        let previous = self.retiring.remove(&user_id);
        let handle = tokio::spawn(worker_loop(user_id, self.handler.clone(), rx, previous));
        Worker {
            tx,
            handle,
            last_event: Instant::now(),
        }
    }
}

async fn worker_loop(
    user_id: i64,
    handler: Arc<dyn EventHandler>,
    mut rx: mpsc::Receiver<InboundEvent>,
    previous: Option<JoinHandle<()>>,
) {
    // The user's earlier worker must finish its backlog first
    if let Some(previous) = previous
        && let Err(e) = previous.await
    {
        warn!(%user_id, error = %e, "worker_loop: previous worker failed");
    }
    while let Some(event) = rx.recv().await {
        handler.handle(event).await;
    }
    debug!(%user_id, "worker_loop: exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::EventKind;
    use std::sync::Mutex;

    /// Records (user, text) on completion; "slow" takes 50ms, "stuck" 30s
    #[derive(Default)]
    struct Recording {
        done: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl EventHandler for Recording {
        async fn handle(&self, event: InboundEvent) {
            let EventKind::Text(text) = event.kind else { return };
            match text.as_str() {
                "slow" => tokio::time::sleep(Duration::from_millis(50)).await,
                "stuck" => tokio::time::sleep(Duration::from_secs(30)).await,
                _ => {}
            }
            self.done.lock().unwrap().push((event.user_id, text));
        }
    }

    fn text(user: i64, t: &str) -> InboundEvent {
        InboundEvent::from_text(user, user, t)
    }

    async fn wait_for(recording: &Recording, count: usize) {
        let start = Instant::now();
        while recording.done.lock().unwrap().len() < count {
            assert!(start.elapsed() < Duration::from_secs(5), "timed out waiting for events");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn texts(recording: &Recording) -> Vec<String> {
        recording.done.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    #[tokio::test]
    async fn test_events_of_one_user_stay_ordered() {
        let recording = Arc::new(Recording::default());
        let mut dispatcher = Dispatcher::new(recording.clone());

        dispatcher.dispatch(text(1, "slow")).unwrap();
        dispatcher.dispatch(text(1, "second")).unwrap();
        dispatcher.dispatch(text(1, "third")).unwrap();
        wait_for(&recording, 3).await;

        assert_eq!(texts(&recording), vec!["slow", "second", "third"]);
        assert_eq!(dispatcher.worker_count(), 1);
    }

    #[tokio::test]
    async fn test_users_run_concurrently() {
        let recording = Arc::new(Recording::default());
        let mut dispatcher = Dispatcher::new(recording.clone());

        dispatcher.dispatch(text(1, "slow")).unwrap();
        dispatcher.dispatch(text(2, "fast")).unwrap();
        wait_for(&recording, 2).await;

        let done = recording.done.lock().unwrap().clone();
        assert_eq!(done[0], (2, "fast".to_string()));
        assert_eq!(done[1], (1, "slow".to_string()));
        assert_eq!(dispatcher.worker_count(), 2);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking_others() {
        let recording = Arc::new(Recording::default());
        let mut dispatcher = Dispatcher::new(recording.clone());

        let rejected = (0..WORKER_CAPACITY + 8)
            .map(|_| dispatcher.dispatch(text(1, "stuck")))
            .filter(|r| *r == Err(DispatchError::Busy(1)))
            .count();
        assert!(rejected > 0);

        dispatcher.dispatch(text(2, "fast")).unwrap();
        wait_for(&recording, 1).await;
        assert_eq!(recording.done.lock().unwrap()[0], (2, "fast".to_string()));
    }

    #[tokio::test]
    async fn test_idle_workers_are_pruned() {
        let recording = Arc::new(Recording::default());
        let mut dispatcher = Dispatcher::new(recording.clone()).with_idle(Duration::from_millis(20));

        for user in 1..=5 {
            dispatcher.dispatch(text(user, "a")).unwrap();
        }
        wait_for(&recording, 5).await;
        assert_eq!(dispatcher.worker_count(), 5);
        tokio::time::sleep(Duration::from_millis(60)).await;

        dispatcher.dispatch(text(9, "b")).unwrap();
        assert_eq!(dispatcher.worker_count(), 1);
        wait_for(&recording, 6).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        dispatcher.dispatch(text(9, "c")).unwrap();
        assert!(dispatcher.retiring.len() <= 1);
    }

    #[tokio::test]
    async fn test_replacement_worker_waits_for_retired_one() {
        let recording = Arc::new(Recording::default());
        let mut dispatcher = Dispatcher::new(recording.clone()).with_idle(Duration::from_millis(10));

        dispatcher.dispatch(text(1, "slow")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        // the first worker is retired while still handling "slow"
        dispatcher.dispatch(text(1, "after")).unwrap();
        wait_for(&recording, 2).await;

        assert_eq!(texts(&recording), vec!["slow", "after"]);
    }
}
