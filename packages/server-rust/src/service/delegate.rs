//! Execution delegates: where an invocation actually runs.
//!
//! `InlineDelegate` runs the call on the caller's thread. `AffinityDelegate`
//! queues it for one designated thread and blocks the caller on a rendezvous
//! until the outcome is recorded.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use objscope_core::Value;
use parking_lot::{Condvar, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A unit of work handed to a delegate.
pub type Call = Box<dyn FnOnce() -> anyhow::Result<Value> + Send + 'static>;

/// Why a delegated call produced no value.
#[derive(Debug, thiserror::Error)]
pub enum DelegateError {
    /// The call ran and raised. Carries the call's own failure unchanged.
    #[error(transparent)]
    Raised(anyhow::Error),
    /// The call never ran because its execution context is gone.
    #[error("execution context unavailable: {reason}")]
    Unavailable { reason: &'static str },
}

/// Runs a call somewhere and hands back its outcome.
///
/// Implementations block the calling thread until the outcome exists, so
/// callers on an async runtime go through `spawn_blocking`.
pub trait ExecutionDelegate: Send + Sync {
    /// # Errors
    ///
    /// `DelegateError::Raised` with the call's own failure, or
    /// `DelegateError::Unavailable` when the call could not be run at all.
    fn delegate(&self, call: Call) -> Result<Value, DelegateError>;
}

/// Runs `call`, folding a panic into an ordinary failure.
fn run_guarded(call: Call) -> Result<Value, DelegateError> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(DelegateError::Raised(err)),
        Err(payload) => Err(DelegateError::Raised(anyhow::anyhow!(
            "operation panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

// ---------------------------------------------------------------------------
// InlineDelegate
// ---------------------------------------------------------------------------

/// Runs every call directly on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDelegate;

impl ExecutionDelegate for InlineDelegate {
    fn delegate(&self, call: Call) -> Result<Value, DelegateError> {
        run_guarded(call)
    }
}

// ---------------------------------------------------------------------------
// Rendezvous
// ---------------------------------------------------------------------------

/// Counting permit. `acquire` returns only after a matching `release`,
/// however many times the waiter is woken in between.
#[derive(Debug, Default)]
struct CountingPermit {
    permits: Mutex<usize>,
    available: Condvar,
}

impl CountingPermit {
    fn release(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        self.available.notify_one();
    }

    fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    #[cfg(test)]
    fn wake_without_release(&self) {
        let _permits = self.permits.lock();
        self.available.notify_all();
    }

    #[cfg(test)]
    fn available(&self) -> usize {
        *self.permits.lock()
    }
}

/// One-shot handoff of a call's outcome from the designated thread to the
/// blocked caller.
#[derive(Debug, Default)]
struct Rendezvous {
    outcome: Mutex<Option<Result<Value, DelegateError>>>,
    permit: CountingPermit,
}

impl Rendezvous {
    /// Records the outcome, then signals. Called at most once per rendezvous.
    fn fulfil(&self, outcome: Result<Value, DelegateError>) {
        *self.outcome.lock() = Some(outcome);
        self.permit.release();
    }

    fn wait(&self) -> Result<Value, DelegateError> {
        self.permit.acquire();
        self.outcome.lock().take().unwrap_or(Err(DelegateError::Unavailable {
            reason: "outcome missing after signal",
        }))
    }
}

/// A queued call plus the rendezvous its caller waits on.
///
/// Dropping a job that never ran fulfils the rendezvous with `Unavailable`,
/// so a caller is never left waiting on a queue that has gone away.
struct AffinityJob {
    call: Option<Call>,
    rendezvous: Option<Arc<Rendezvous>>,
}

impl AffinityJob {
    fn new(call: Call, rendezvous: Arc<Rendezvous>) -> Self {
        Self {
            call: Some(call),
            rendezvous: Some(rendezvous),
        }
    }

    fn run(mut self) {
        if let (Some(call), Some(rendezvous)) = (self.call.take(), self.rendezvous.take()) {
            rendezvous.fulfil(run_guarded(call));
        }
    }
}

impl std::fmt::Debug for AffinityJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinityJob")
            .field("pending", &self.call.is_some())
            .finish()
    }
}

impl Drop for AffinityJob {
    fn drop(&mut self) {
        if let Some(rendezvous) = self.rendezvous.take() {
            rendezvous.fulfil(Err(DelegateError::Unavailable {
                reason: "designated context dropped the call",
            }));
        }
    }
}

// ---------------------------------------------------------------------------
// AffinityDelegate
// ---------------------------------------------------------------------------

type Owner = Arc<Mutex<Option<ThreadId>>>;

/// Sends every call to one designated thread and blocks until it finishes.
///
/// A call made from the designated thread itself runs inline.
#[derive(Debug, Clone)]
pub struct AffinityDelegate {
    tx: mpsc::Sender<AffinityJob>,
    owner: Owner,
}

/// Receiving end of an [`AffinityDelegate`]. Whichever thread drives it
/// becomes the designated thread.
pub struct AffinityQueue {
    rx: mpsc::Receiver<AffinityJob>,
    owner: Owner,
}

impl AffinityDelegate {
    /// Creates a delegate and the queue a designated thread must drive.
    ///
    /// `capacity` bounds the queue; callers block while it is full.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, AffinityQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let owner: Owner = Arc::new(Mutex::new(None));
        (
            Self {
                tx,
                owner: Arc::clone(&owner),
            },
            AffinityQueue { rx, owner },
        )
    }

    /// Spawns a named OS thread that drives the queue until every delegate
    /// handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns the error from `std::thread::Builder::spawn`.
    pub fn spawn_thread(name: &str, capacity: usize) -> std::io::Result<(Self, JoinHandle<()>)> {
        let (delegate, queue) = Self::channel(capacity);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || queue.run())?;
        Ok((delegate, handle))
    }

    fn on_designated_thread(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }
}

impl ExecutionDelegate for AffinityDelegate {
    fn delegate(&self, call: Call) -> Result<Value, DelegateError> {
        if self.on_designated_thread() {
            return run_guarded(call);
        }

        let rendezvous = Arc::new(Rendezvous::default());
        let job = AffinityJob::new(call, Arc::clone(&rendezvous));
        if self.tx.blocking_send(job).is_err() {
            warn!("affinity queue closed, call not delivered");
            return Err(DelegateError::Unavailable {
                reason: "designated context has shut down",
            });
        }
        rendezvous.wait()
    }
}

impl AffinityQueue {
    /// Runs queued calls on the current thread until every sender is gone.
    pub fn run(mut self) {
        self.claim();
        debug!("affinity queue running");
        while let Some(job) = self.rx.blocking_recv() {
            job.run();
        }
        debug!("affinity queue drained, all delegates dropped");
    }

    /// Runs whatever is queued right now without blocking. Returns the
    /// number of calls run.
    pub fn run_pending(&mut self) -> usize {
        self.claim();
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job.run();
            ran += 1;
        }
        ran
    }

    /// Refuses further calls. Calls already queued still run if the queue
    /// keeps being driven, and are failed as `Unavailable` if it is dropped.
    pub fn close(&mut self) {
        self.rx.close();
    }

    fn claim(&self) {
        *self.owner.lock() = Some(thread::current().id());
    }
}

impl std::fmt::Debug for AffinityQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinityQueue").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
