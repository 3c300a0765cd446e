use std::{
    any::Any,
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::{FutureExt, Stream, StreamExt};
use tokio::{sync::mpsc, task::JoinSet, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    ack::AckTracker,
    commit::Committer,
    config::DispatchConfig,
    dead_letter::DeadLetterSink,
    decoder::EventDecoder,
    error::{ConfigError, DispatchError},
    message::{Message, Outcome, TopicPartition},
    registry::{Event, Handler, HandlerRegistry},
    retry::RetryPolicy,
};

/// Final, determined outcome of one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub outcome: Outcome,
    pub attempts: u32,
}

#[derive(Debug, Default)]
pub struct DispatchStats {
    received: AtomicU64,
    processed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    dead_lettered: AtomicU64,
    retries: AtomicU64,
    commits: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub received: u64,
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub dead_lettered: u64,
    pub retries: u64,
    pub commits: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
        }
    }

    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Pulls messages, decodes, routes and invokes handlers with timeout and
/// retry, then feeds outcomes to the [`AckTracker`] and commits.
///
/// One worker per partition: partitions run in parallel, messages of a single
/// partition strictly in offset order.
pub struct Dispatcher<D: EventDecoder> {
    decoder: D,
    registry: HandlerRegistry<D::Event>,
    tracker: AckTracker,
    dead_letter: Arc<dyn DeadLetterSink>,
    committer: Arc<dyn Committer>,
    config: DispatchConfig,
    retry: RetryPolicy,
    stats: DispatchStats,
    observer: Option<mpsc::UnboundedSender<Completion>>,
}

impl<D: EventDecoder> Dispatcher<D> {
    pub fn new(
        decoder: D,
        registry: HandlerRegistry<D::Event>,
        dead_letter: Arc<dyn DeadLetterSink>,
        committer: Arc<dyn Committer>,
        config: DispatchConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            decoder,
            registry,
            tracker: AckTracker::new(config.commit_past_failures),
            dead_letter,
            committer,
            retry: RetryPolicy::from(&config),
            config,
            stats: DispatchStats::default(),
            observer: None,
        })
    }

    /// Every determined outcome is also sent to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<Completion>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn tracker(&self) -> &AckTracker {
        &self.tracker
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Consumes `source` until it ends or `cancel` fires.
    ///
    /// On a clean end of input the partition queues are drained. On
    /// cancellation queued messages are left undetermined and are never
    /// committed.
    pub async fn run<S>(self: Arc<Self>, mut source: S, cancel: CancellationToken) -> StatsSnapshot
    where
        S: Stream<Item = Message> + Send + Unpin,
    {
        let mut workers: HashMap<TopicPartition, mpsc::Sender<Message>> = HashMap::new();
        let mut last_offsets: HashMap<TopicPartition, i64> = HashMap::new();
        let mut tasks = JoinSet::new();

        info!("dispatcher running...");

        loop {
            let message = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("dispatcher cancelled, stopping intake");
                    break;
                }

                next = source.next() => match next {
                    Some(message) => message,
                    None => {
                        info!("message source exhausted");
                        break;
                    }
                }
            };

            let tp = message.topic_partition();
            if last_offsets
                .get(&tp)
                .is_some_and(|&last| message.offset <= last)
            {
                warn!(
                    partition = %tp,
                    offset = message.offset,
                    "dropping redelivered message behind partition position"
                );
                continue;
            }
            last_offsets.insert(tp.clone(), message.offset);
            self.tracker.track(&tp, message.offset);

            let tx = workers
                .entry(tp.clone())
                .or_insert_with(|| self.spawn_worker(&mut tasks, tp, cancel.clone()));

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("dispatcher cancelled while enqueueing");
                    break;
                }

                res = tx.send(message) => {
                    if let Err(e) = res {
                        warn!(offset = e.0.offset, "partition worker gone, message left undetermined");
                    }
                }
            }
        }

        drop(workers);
        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                error!("partition worker failed: {}", e);
            }
        }

        let stats = self.stats();
        info!(?stats, "dispatcher stopped");
        stats
    }

    fn spawn_worker(
        self: &Arc<Self>,
        tasks: &mut JoinSet<()>,
        tp: TopicPartition,
        cancel: CancellationToken,
    ) -> mpsc::Sender<Message> {
        let (tx, mut rx) = mpsc::channel::<Message>(self.config.partition_queue_capacity);
        let dispatcher = self.clone();

        debug!(partition = %tp, "starting partition worker");

        tasks.spawn(async move {
            loop {
                let message = tokio::select! {
                    biased;

                    _ = cancel.cancelled() => break,

                    next = rx.recv() => match next {
                        Some(message) => message,
                        None => break,
                    }
                };

                dispatcher.ingest(message, &cancel).await;
            }

            debug!(partition = %tp, "partition worker stopped");
        });

        tx
    }

    /// Handles one message end to end. Returns `None` when shutdown interrupted
    /// processing before an outcome was determined.
    pub async fn ingest(&self, message: Message, cancel: &CancellationToken) -> Option<Outcome> {
        let tp = message.topic_partition();
        self.tracker.track(&tp, message.offset);
        DispatchStats::incr(&self.stats.received);

        let Some((outcome, attempts)) = self.process(&message, cancel).await else {
            warn!(
                partition = %tp,
                offset = message.offset,
                "shutdown before outcome was determined, offset stays uncommitted"
            );
            return None;
        };

        self.record(&tp, &message, &outcome, attempts).await;
        Some(outcome)
    }

    async fn process(
        &self,
        message: &Message,
        cancel: &CancellationToken,
    ) -> Option<(Outcome, u32)> {
        let event = match self.decoder.decode(message) {
            Ok(event) => event,
            Err(e) => {
                let err = DispatchError::from(e);
                warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %err,
                    "skipping undecodable message"
                );
                let reason = err.to_string();
                // A poison message never holds the partition, even without a dead letter.
                if let Err(sink_err) = self.send_dead_letter(message, &reason, 0, cancel).await? {
                    error!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        "undecodable message skipped without dead letter: {}",
                        sink_err
                    );
                }
                return Some((Outcome::Skipped(reason), 0));
            }
        };

        let handler = match self.registry.lookup(event.event_type()) {
            Ok(handler) => handler,
            Err(err) => {
                debug!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    "{}",
                    err
                );
                return Some((Outcome::Skipped(err.to_string()), 0));
            }
        };

        let mut attempt = 0;
        loop {
            attempt += 1;

            let err = match self.invoke(handler.as_ref(), &event).await {
                Ok(()) => return Some((Outcome::Processed, attempt)),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.retry.max_attempts() {
                let reason = format!("{err} (after {attempt} attempts)");
                return match self.send_dead_letter(message, &reason, attempt, cancel).await? {
                    Ok(()) => Some((Outcome::Processed, attempt)),
                    Err(sink_err) => Some((Outcome::Failed(sink_err), attempt)),
                };
            }

            let delay = self.retry.backoff(attempt);
            warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                attempt,
                ?delay,
                error = %err,
                "handler attempt failed, retrying"
            );
            DispatchStats::incr(&self.stats.retries);

            if !sleep_or_cancel(delay, cancel).await {
                return None;
            }
        }
    }

    async fn invoke(
        &self,
        handler: &dyn Handler<D::Event>,
        event: &D::Event,
    ) -> Result<(), DispatchError> {
        let budget = self.config.handler_timeout();

        let call = AssertUnwindSafe(handler.handle(event)).catch_unwind();

        match time::timeout(budget, call).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(DispatchError::from_handler(e)),
            Ok(Err(panic)) => Err(DispatchError::Handler(format!(
                "handler panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Err(_) => Err(DispatchError::Timeout(budget)),
        }
    }

    /// Outer `None`: cancelled while backing off. Inner `Err`: sink still
    /// failing once retries ran out.
    async fn send_dead_letter(
        &self,
        message: &Message,
        reason: &str,
        attempts: u32,
        cancel: &CancellationToken,
    ) -> Option<Result<(), String>> {
        let mut try_no = 0;

        loop {
            try_no += 1;

            match self.dead_letter.send(message, reason).await {
                Ok(()) => {
                    error!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        key = ?message.key_lossy(),
                        timestamp = %message.timestamp,
                        attempts,
                        reason,
                        "message dead-lettered"
                    );
                    DispatchStats::incr(&self.stats.dead_lettered);
                    return Some(Ok(()));
                }
                Err(e) if try_no >= self.retry.max_attempts() => {
                    error!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        reason,
                        "dead-letter sink failed: {:#}",
                        e
                    );
                    return Some(Err(format!("dead-letter sink failed: {e:#}")));
                }
                Err(e) => {
                    let delay = self.retry.backoff(try_no);
                    warn!(offset = message.offset, ?delay, "dead-letter send failed: {:#}", e);

                    if !sleep_or_cancel(delay, cancel).await {
                        return None;
                    }
                }
            }
        }
    }

    async fn record(&self, tp: &TopicPartition, message: &Message, outcome: &Outcome, attempts: u32) {
        match outcome {
            Outcome::Processed => DispatchStats::incr(&self.stats.processed),
            Outcome::Skipped(_) => DispatchStats::incr(&self.stats.skipped),
            Outcome::Failed(_) => DispatchStats::incr(&self.stats.failed),
        }

        if let Some(offset) = self.tracker.mark_done(tp, message.offset, outcome) {
            match self.committer.commit(tp, offset).await {
                Ok(()) => {
                    DispatchStats::incr(&self.stats.commits);
                    debug!(partition = %tp, offset, "offset committed");
                }
                Err(e) => {
                    warn!(partition = %tp, offset, "commit failed, next commit supersedes: {:#}", e);
                }
            }
        }

        if let Some(observer) = &self.observer {
            let _ = observer.send(Completion {
                topic: message.topic.clone(),
                partition: message.partition,
                offset: message.offset,
                outcome: outcome.clone(),
                attempts,
            });
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "non-string panic payload"
    }
}

/// Returns `false` if cancelled before the delay elapsed.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => false,
        _ = time::sleep(delay) => true,
    }
}
