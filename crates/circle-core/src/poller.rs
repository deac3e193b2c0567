//! Native poller driver
//!
//! Runs a [`PollMachine`] on tokio timers. One status read is in flight at a
//! time, and every read and wait is cut off at the loop's deadline
//! (`max_attempts * interval`). Dropping the [`PollerHandle`] aborts the
//! task, so no timer outlives the page or client that started it.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::account::{AccountStore, PaymentStatus, UserId};
use crate::error::{CoreError, Result};
use crate::poll::{PollAction, PollConfig, PollEvent, PollMachine, PollPhase};

/// Anything that can answer "has this user paid"
#[async_trait]
pub trait PaymentStatusSource: Send + Sync {
    async fn read_status(&self, user_id: &UserId) -> Result<PaymentStatus>;
}

#[async_trait]
impl<T: AccountStore + ?Sized> PaymentStatusSource for T {
    async fn read_status(&self, user_id: &UserId) -> Result<PaymentStatus> {
        self.payment_status(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(user_id.to_string()))
    }
}

/// Drives one confirmation-page session
pub struct Poller<S: PaymentStatusSource + ?Sized> {
    source: Arc<S>,
    machine: PollMachine,
    next: PollAction,
    phase_tx: watch::Sender<PollPhase>,
}

impl<S: PaymentStatusSource + ?Sized + 'static> Poller<S> {
    pub fn new(source: Arc<S>, user_id: Option<&str>, config: PollConfig) -> Self {
        let (machine, next) = PollMachine::start(config, user_id);
        let (phase_tx, _) = watch::channel(machine.phase());
        Self {
            source,
            machine,
            next,
            phase_tx,
        }
    }

    /// Observe phase changes
    pub fn subscribe(&self) -> watch::Receiver<PollPhase> {
        self.phase_tx.subscribe()
    }

    pub const fn machine(&self) -> &PollMachine {
        &self.machine
    }

    /// Run the automatic loop until a terminal phase is reached
    pub async fn run(&mut self) -> PollPhase {
        let deadline = Instant::now() + self.machine.config().deadline();

        loop {
            let event = match self.next {
                PollAction::ReadStatus => self.read_before(deadline).await,
                PollAction::ScheduleRetry(delay) => {
                    let wake = Instant::now() + delay;
                    if wake >= deadline {
                        // The next read could not finish in time
                        PollEvent::Expired
                    } else {
                        tokio::time::sleep_until(wake).await;
                        PollEvent::TimerElapsed
                    }
                }
                PollAction::Redirect(_) | PollAction::AwaitUser | PollAction::Stop => {
                    return self.machine.phase();
                }
            };

            if let Err(e) = self.step(event) {
                tracing::error!("Poller stopped: {}", e);
                return self.machine.phase();
            }
        }
    }

    /// Manual re-check after the loop gave up: exactly one status read
    pub async fn recheck(&mut self) -> Result<PollPhase> {
        self.step(PollEvent::ManualRecheck)?;
        let deadline = Instant::now() + self.machine.config().deadline();
        let event = self.read_before(deadline).await;
        self.step(event)?;
        Ok(self.machine.phase())
    }

    /// Move the loop onto a tokio task
    pub fn spawn(mut self) -> PollerHandle {
        let phase = self.subscribe();
        let task = tokio::spawn(async move { self.run().await });
        PollerHandle {
            task: Some(task),
            phase,
        }
    }

    fn step(&mut self, event: PollEvent) -> Result<()> {
        self.next = self.machine.apply(event)?;
        self.phase_tx.send_replace(self.machine.phase());
        Ok(())
    }

    async fn read_before(&self, deadline: Instant) -> PollEvent {
        if let Ok(event) = tokio::time::timeout_at(deadline, self.read_once()).await {
            event
        } else {
            tracing::warn!("Payment status read still pending at deadline");
            PollEvent::Expired
        }
    }

    async fn read_once(&self) -> PollEvent {
        let Some(user_id) = self.machine.user_id() else {
            return PollEvent::ReadFailed { transient: false };
        };

        match self.source.read_status(user_id).await {
            Ok(status) => PollEvent::Observed { paid: status.paid },
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Payment status read failed");
                PollEvent::ReadFailed {
                    transient: e.is_retryable(),
                }
            }
        }
    }
}

/// Poll until the flag is observed or attempts run out
pub async fn poll_until_paid<S>(source: Arc<S>, user_id: &UserId, config: PollConfig) -> PollPhase
where
    S: PaymentStatusSource + ?Sized + 'static,
{
    Poller::new(source, Some(user_id.as_str()), config).run().await
}

/// Handle to a spawned poller; dropping it cancels the loop
pub struct PollerHandle {
    task: Option<JoinHandle<PollPhase>>,
    phase: watch::Receiver<PollPhase>,
}

impl PollerHandle {
    /// Latest published phase
    pub fn phase(&self) -> PollPhase {
        *self.phase.borrow()
    }

    /// Wait for the next phase change
    pub async fn changed(&mut self) -> Option<PollPhase> {
        self.phase.changed().await.ok()?;
        Some(*self.phase.borrow_and_update())
    }

    /// Wait for the loop to finish
    pub async fn finish(mut self) -> Result<PollPhase> {
        let task = self
            .task
            .take()
            .ok_or_else(|| CoreError::InvalidInput("poller already finished".into()))?;
        task.await
            .map_err(|e| CoreError::Storage(format!("poller task failed: {e}")))
    }

    /// Stop scheduling further attempts
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{MemoryAccountStore, NewAccount};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    /// Counts reads and answers with a fixed result
    struct CountingSource {
        reads: AtomicU32,
        answer: fn(u32) -> Result<bool>,
    }

    impl CountingSource {
        fn new(answer: fn(u32) -> Result<bool>) -> Arc<Self> {
            Arc::new(Self {
                reads: AtomicU32::new(0),
                answer,
            })
        }

        fn reads(&self) -> u32 {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentStatusSource for CountingSource {
        async fn read_status(&self, user_id: &UserId) -> Result<PaymentStatus> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            let paid = (self.answer)(n)?;
            let now = chrono::Utc::now();
            Ok(PaymentStatus {
                user_id: user_id.clone(),
                paid,
                created_at: now,
                updated_at: now,
            })
        }
    }

    /// Answers "unpaid" after a fixed delay
    struct SlowSource {
        delay: Duration,
        reads: AtomicU32,
    }

    #[async_trait]
    impl PaymentStatusSource for SlowSource {
        async fn read_status(&self, user_id: &UserId) -> Result<PaymentStatus> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let now = chrono::Utc::now();
            Ok(PaymentStatus {
                user_id: user_id.clone(),
                paid: false,
                created_at: now,
                updated_at: now,
            })
        }
    }

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_paid_fails_within_deadline() {
        let source = CountingSource::new(|_| Ok(false));
        let config = PollConfig::new(5, Duration::from_secs(2)).unwrap();

        let started = Instant::now();
        let phase = poll_until_paid(source.clone(), &uid("u1"), config).await;

        assert_eq!(phase, PollPhase::Failed);
        assert_eq!(source.reads(), 5);
        assert!(started.elapsed() <= config.deadline());
        assert!(started.elapsed() >= Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_reads_still_end_by_deadline() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_secs(5),
            reads: AtomicU32::new(0),
        });
        let config = PollConfig::new(5, Duration::from_secs(2)).unwrap();

        let started = Instant::now();
        let phase = poll_until_paid(source.clone(), &uid("u1"), config).await;

        assert_eq!(phase, PollPhase::Failed);
        assert!(started.elapsed() <= config.deadline());
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_read_ends_by_deadline() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_secs(3600),
            reads: AtomicU32::new(0),
        });
        let config = PollConfig::default();

        let started = Instant::now();
        let mut poller = Poller::new(source.clone(), Some("u1"), config);
        assert_eq!(poller.run().await, PollPhase::Failed);
        assert!(started.elapsed() <= config.deadline());

        // Manual re-check is bounded too
        assert_eq!(poller.recheck().await.unwrap(), PollPhase::Failed);
        assert!(started.elapsed() <= config.deadline() * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirms_once_webhook_lands() {
        let store = Arc::new(MemoryAccountStore::new());
        store
            .create(NewAccount::new(uid("u1"), "u1@example.com").unwrap())
            .await
            .unwrap();

        let writer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            writer.mark_paid(&uid("u1")).await.unwrap();
        });

        let phase = poll_until_paid(store, &uid("u1"), PollConfig::default()).await;
        assert_eq!(phase, PollPhase::Confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_account_is_error() {
        let store = Arc::new(MemoryAccountStore::new());
        let phase = poll_until_paid(store, &uid("ghost"), PollConfig::default()).await;
        assert_eq!(phase, PollPhase::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let source = CountingSource::new(|n| {
            if n < 3 {
                Err(CoreError::Unavailable("backend busy".into()))
            } else {
                Ok(true)
            }
        });

        let phase = poll_until_paid(source.clone(), &uid("u1"), PollConfig::default()).await;
        assert_eq!(phase, PollPhase::Confirmed);
        assert_eq!(source.reads(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_recheck_after_failure() {
        let source = CountingSource::new(|n| Ok(n > 5));
        let mut poller = Poller::new(source.clone(), Some("u1"), PollConfig::default());

        assert_eq!(poller.run().await, PollPhase::Failed);
        assert_eq!(poller.recheck().await.unwrap(), PollPhase::Confirmed);
        assert_eq!(source.reads(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_user_id_never_reads() {
        let source = CountingSource::new(|_| Ok(true));
        let mut poller = Poller::new(source.clone(), None, PollConfig::default());

        assert_eq!(poller.run().await, PollPhase::Error);
        assert_eq!(source.reads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_polling() {
        let source = CountingSource::new(|_| Ok(false));
        let handle = Poller::new(source.clone(), Some("u1"), PollConfig::default()).spawn();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let seen = source.reads();
        assert!(seen >= 1);

        drop(handle);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.reads(), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_publishes_phases() {
        let source = CountingSource::new(|n| Ok(n >= 2));
        let mut handle = Poller::new(source, Some("u1"), PollConfig::default()).spawn();

        let mut seen = Vec::new();
        while let Some(phase) = handle.changed().await {
            seen.push(phase);
            if phase.is_terminal() {
                break;
            }
        }

        assert_eq!(seen.last(), Some(&PollPhase::Confirmed));
        assert_eq!(handle.finish().await.unwrap(), PollPhase::Confirmed);
    }
}
