//! The score event worker: dispatch, per-exam lanes, retries.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use common::ExamId;
use score_store::{ScoreChange, ScoreStore, StoreError};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;

use crate::{
    DeadLetterLog, EventSource, IdempotencyCache, Result, RetryPolicy, ScoreEvent,
    ValidatedEvent, WorkerConfig,
};

/// Counters describing what a worker has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Events pulled from the source.
    pub received: u64,
    /// Events applied to the store.
    pub applied: u64,
    /// Events skipped because their ID was already applied.
    pub duplicates: u64,
    /// Events dropped by validation.
    pub rejected: u64,
    /// Events that exhausted their retries.
    pub dead_lettered: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    applied: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    dead_lettered: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            received: self.received.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}

/// State shared by the dispatcher and every lane.
struct Shared<S> {
    store: S,
    retry: RetryPolicy,
    idempotency: Mutex<IdempotencyCache>,
    dead_letters: DeadLetterLog,
    counters: Arc<Counters>,
}

/// A failed apply after the retry budget was spent or a permanent error hit.
struct ApplyFailure {
    error: StoreError,
    attempts: u32,
}

/// Consumes score events and applies them to a [`ScoreStore`].
///
/// Each event is validated, deduplicated by event ID and applied with bounded
/// retries. Events are routed to lanes by exam, so one exam's events apply in
/// arrival order while different exams proceed in parallel.
pub struct ScoreEventWorker<S: ScoreStore> {
    config: WorkerConfig,
    shared: Arc<Shared<S>>,
}

impl<S: ScoreStore + 'static> ScoreEventWorker<S> {
    /// Creates a worker applying events to `store`.
    pub fn new(store: S, config: WorkerConfig) -> Self {
        let shared = Shared {
            store,
            retry: config.retry.clone(),
            idempotency: Mutex::new(IdempotencyCache::new(config.idempotency_capacity)),
            dead_letters: DeadLetterLog::new(),
            counters: Arc::new(Counters::default()),
        };
        Self {
            config,
            shared: Arc::new(shared),
        }
    }

    /// Returns a handle to the dead-letter log.
    pub fn dead_letters(&self) -> DeadLetterLog {
        self.shared.dead_letters.clone()
    }

    /// Returns the current counters.
    pub fn stats(&self) -> WorkerStats {
        self.shared.counters.snapshot()
    }

    /// Processes a single event inline, bypassing lanes.
    ///
    /// Useful for replaying dead letters once the worker is stopped. While a
    /// worker started from this instance is running, replay through
    /// [`WorkerHandle::submit`] instead so the event keeps its exam's order.
    pub async fn process(&self, event: ScoreEvent) {
        self.shared.counters.received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("score_events_received_total").increment(1);
        if let Some(event) = self.shared.validate(&event) {
            self.shared.apply(event).await;
        }
    }

    /// Starts consuming from `source` and returns a handle to stop the worker.
    ///
    /// The worker runs until the source is exhausted or the handle is stopped.
    pub fn start<E>(&self, source: E) -> WorkerHandle
    where
        E: EventSource + 'static,
    {
        let lane_count = self.config.lanes.max(1);
        let capacity = self.config.queue_capacity.max(1);

        let mut senders = Vec::with_capacity(lane_count);
        let mut lanes = Vec::with_capacity(lane_count);
        for lane in 0..lane_count {
            let (tx, rx) = mpsc::channel(capacity);
            senders.push(tx);
            lanes.push(tokio::spawn(run_lane(lane, rx, Arc::clone(&self.shared))));
        }

        let shutdown = Arc::new(Notify::new());
        let dispatcher = tokio::spawn(dispatch(
            source,
            senders.clone(),
            Arc::clone(&self.shared),
            Arc::clone(&shutdown),
        ));

        tracing::info!(lanes = lane_count, queue_capacity = capacity, "score event worker started");

        WorkerHandle {
            shutdown,
            dispatcher,
            lanes,
            senders,
            shared: Arc::clone(&self.shared) as Arc<dyn Submit>,
        }
    }
}

/// Cloneable trigger that asks a running worker to stop.
#[derive(Debug, Clone)]
pub struct StopSignal(Arc<Notify>);

impl StopSignal {
    /// Requests a graceful stop. Idempotent; returns immediately.
    pub fn stop(&self) {
        self.0.notify_one();
    }
}

/// Store-independent view of the shared state, so the handle is not generic.
#[async_trait]
trait Submit: Send + Sync {
    fn counters(&self) -> &Counters;
    fn dead_letter_log(&self) -> &DeadLetterLog;
    async fn enqueue(&self, senders: &[mpsc::Sender<ValidatedEvent>], event: ScoreEvent) -> bool;
}

#[async_trait]
impl<S: ScoreStore> Submit for Shared<S> {
    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn dead_letter_log(&self) -> &DeadLetterLog {
        &self.dead_letters
    }

    async fn enqueue(&self, senders: &[mpsc::Sender<ValidatedEvent>], event: ScoreEvent) -> bool {
        self.route(senders, event).await
    }
}

/// Handle to a running worker.
pub struct WorkerHandle {
    shutdown: Arc<Notify>,
    dispatcher: JoinHandle<()>,
    lanes: Vec<JoinHandle<()>>,
    senders: Vec<mpsc::Sender<ValidatedEvent>>,
    shared: Arc<dyn Submit>,
}

impl WorkerHandle {
    /// Returns the current counters.
    pub fn stats(&self) -> WorkerStats {
        self.shared.counters().snapshot()
    }

    /// Returns a handle to the dead-letter log.
    pub fn dead_letters(&self) -> DeadLetterLog {
        self.shared.dead_letter_log().clone()
    }

    /// Feeds an event into the running worker alongside the source.
    ///
    /// The event goes through validation, deduplication and its exam's lane,
    /// so it applies in order with that exam's other events. Used to replay
    /// dead letters without stopping the worker.
    pub async fn submit(&self, event: ScoreEvent) {
        self.shared.enqueue(&self.senders, event).await;
    }

    /// Returns a trigger that can stop the worker from another task.
    pub fn stop_signal(&self) -> StopSignal {
        StopSignal(Arc::clone(&self.shutdown))
    }

    /// Stops pulling from the source and waits for accepted events to finish.
    ///
    /// Every event already taken from the source is either fully applied or
    /// dead-lettered before this returns.
    pub async fn stop(self) -> Result<WorkerStats> {
        tracing::info!("stopping score event worker");
        self.stop_signal().stop();
        self.join().await
    }

    /// Waits for the worker to finish on its own, once the source is exhausted.
    pub async fn join(self) -> Result<WorkerStats> {
        let WorkerHandle {
            dispatcher,
            lanes,
            senders,
            shared,
            ..
        } = self;

        dispatcher.await?;
        // Lanes exit once the dispatcher's and our senders are both gone.
        drop(senders);
        for lane in lanes {
            lane.await?;
        }
        let stats = shared.counters().snapshot();
        tracing::info!(
            received = stats.received,
            applied = stats.applied,
            duplicates = stats.duplicates,
            rejected = stats.rejected,
            dead_lettered = stats.dead_lettered,
            "score event worker stopped"
        );
        Ok(stats)
    }
}

/// Picks the lane for an exam. Stable for the lifetime of the process.
fn lane_for(exam_id: &ExamId, lanes: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    exam_id.hash(&mut hasher);
    (hasher.finish() % lanes as u64) as usize
}

async fn dispatch<S, E>(
    mut source: E,
    senders: Vec<mpsc::Sender<ValidatedEvent>>,
    shared: Arc<Shared<S>>,
    shutdown: Arc<Notify>,
) where
    S: ScoreStore,
    E: EventSource,
{
    loop {
        let next = tokio::select! {
            biased;
            () = shutdown.notified() => {
                tracing::debug!("dispatcher received stop");
                break;
            }
            next = source.next_event() => next,
        };

        let Some(event) = next else {
            tracing::info!("event source exhausted");
            break;
        };

        // A full lane blocks here, which is what stops us pulling from the source.
        if !shared.route(&senders, event).await {
            tracing::error!("lane closed, dispatcher exiting");
            break;
        }
    }
    // Lanes drain and exit once the handle drops its senders too.
}

async fn run_lane<S: ScoreStore>(
    lane: usize,
    mut events: mpsc::Receiver<ValidatedEvent>,
    shared: Arc<Shared<S>>,
) {
    tracing::debug!(lane, "lane started");
    while let Some(event) = events.recv().await {
        shared.apply(event).await;
    }
    tracing::debug!(lane, "lane drained");
}

impl<S: ScoreStore> Shared<S> {
    /// Counts, validates and queues `event` on its exam's lane.
    ///
    /// Returns false only if the lane is closed; the event is dead-lettered.
    async fn route(&self, senders: &[mpsc::Sender<ValidatedEvent>], event: ScoreEvent) -> bool {
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("score_events_received_total").increment(1);

        let Some(event) = self.validate(&event) else {
            return true;
        };

        let lane = lane_for(&event.exam_id, senders.len());
        if let Err(mpsc::error::SendError(event)) = senders[lane].send(event).await {
            tracing::error!(lane, event_id = %event.event_id, "lane closed");
            self.dead_letters
                .record(ScoreEvent::from(&event), "worker lane closed", 0)
                .await;
            self.counters.dead_lettered.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    fn validate(&self, event: &ScoreEvent) -> Option<ValidatedEvent> {
        match event.validate() {
            Ok(event) => Some(event),
            Err(err) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    exam_id = %event.exam_id,
                    student_id = %event.student_id,
                    score = event.score,
                    error = %err,
                    "dropping invalid score event"
                );
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("score_events_rejected_total", "reason" => "invalid")
                    .increment(1);
                None
            }
        }
    }

    #[tracing::instrument(
        skip(self, event),
        fields(event_id = %event.event_id, exam_id = %event.exam_id, student_id = %event.student_id)
    )]
    async fn apply(&self, event: ValidatedEvent) {
        if !self.idempotency.lock().await.reserve(&event.event_id) {
            tracing::debug!("duplicate score event skipped");
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("score_events_duplicate_total").increment(1);
            return;
        }

        let started = Instant::now();
        match self.apply_with_retry(&event).await {
            Ok(change) => {
                self.counters.applied.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("score_events_applied_total").increment(1);
                metrics::histogram!("score_apply_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                match change {
                    ScoreChange::Inserted => tracing::debug!("score recorded"),
                    ScoreChange::Replaced { previous } => {
                        tracing::debug!(previous = previous.value(), "score replaced")
                    }
                }
            }
            Err(failure) => {
                self.idempotency.lock().await.release(&event.event_id);
                self.counters.dead_lettered.fetch_add(1, Ordering::Relaxed);
                self.dead_letters
                    .record(
                        ScoreEvent::from(&event),
                        failure.error.to_string(),
                        failure.attempts,
                    )
                    .await;
            }
        }
    }

    async fn apply_with_retry(
        &self,
        event: &ValidatedEvent,
    ) -> std::result::Result<ScoreChange, ApplyFailure> {
        let max_attempts = self.retry.attempts();
        let mut attempt = 1;
        loop {
            match self
                .store
                .apply_score(&event.exam_id, &event.student_id, event.score)
                .await
            {
                Ok(change) => return Ok(change),
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(attempt, ?delay, error = %error, "transient store error, retrying");
                    metrics::counter!("score_apply_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(ApplyFailure {
                        error,
                        attempts: attempt,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IterEventSource;
    use score_store::AggregateStore;

    #[test]
    fn test_lane_is_stable_and_in_range() {
        let exam = ExamId::new("exam-42").unwrap();
        let first = lane_for(&exam, 8);
        assert!(first < 8);
        for _ in 0..10 {
            assert_eq!(lane_for(&exam, 8), first);
        }
        assert_eq!(lane_for(&exam, 1), 0);
    }

    #[tokio::test]
    async fn test_process_inline() {
        let store = AggregateStore::new();
        let worker = ScoreEventWorker::new(store.clone(), WorkerConfig::default());

        worker
            .process(ScoreEvent::new("e", "s", 0.4).with_event_id("a"))
            .await;
        worker
            .process(ScoreEvent::new("e", "s", 0.9).with_event_id("a"))
            .await;
        worker.process(ScoreEvent::new("", "s", 0.9)).await;

        let stats = worker.stats();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.rejected, 1);

        let exam = store.get_exam(&ExamId::new("e").unwrap()).await.unwrap();
        assert!((exam.average() - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stop_signal_stops_idle_worker() {
        let worker = ScoreEventWorker::new(AggregateStore::new(), WorkerConfig::default());
        let (_tx, source) = crate::ChannelEventSource::channel(1);
        let handle = worker.start(source);

        let signal = handle.stop_signal();
        signal.stop();
        signal.stop();

        let stats = handle.join().await.unwrap();
        assert_eq!(stats, WorkerStats::default());
    }

    #[tokio::test]
    async fn test_join_after_source_exhausted() {
        let store = AggregateStore::new();
        let worker = ScoreEventWorker::new(store.clone(), WorkerConfig::default());
        let handle = worker.start(IterEventSource::new(vec![
            ScoreEvent::new("e1", "s1", 0.5),
            ScoreEvent::new("e2", "s1", 0.7),
        ]));

        let stats = handle.join().await.unwrap();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.applied, 2);
        assert_eq!(store.exam_count().await, 2);
    }

    #[tokio::test]
    async fn test_submit_goes_through_lanes() {
        let store = AggregateStore::new();
        let worker = ScoreEventWorker::new(store.clone(), WorkerConfig::default());
        let (tx, source) = crate::ChannelEventSource::channel(4);
        let handle = worker.start(source);

        tx.send(ScoreEvent::new("e", "s", 0.2).with_event_id("first"))
            .await
            .unwrap();
        while handle.stats().applied < 1 {
            tokio::task::yield_now().await;
        }

        handle
            .submit(ScoreEvent::new("e", "s", 0.9).with_event_id("replay"))
            .await;
        handle
            .submit(ScoreEvent::new("e", "s", 0.5).with_event_id("first"))
            .await;
        handle.submit(ScoreEvent::new("e", "", 0.5)).await;
        drop(tx);

        let stats = handle.join().await.unwrap();
        assert_eq!(stats.received, 4);
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.rejected, 1);

        let exam = store.get_exam(&ExamId::new("e").unwrap()).await.unwrap();
        assert_eq!(exam.count(), 1);
        assert!((exam.average() - 0.9).abs() < 1e-9);
    }
}
