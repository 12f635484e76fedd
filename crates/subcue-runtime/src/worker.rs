#![forbid(unsafe_code)]

//! Background workers and cooperative cancellation.
//!
//! Asynchronous commands split into two halves:
//!
//! ```text
//!  interactive thread                       worker thread
//!  ───────────────────                      ─────────────
//!  Command::run ─▶ Flow::Background(task)
//!  Engine submits task.work ──────────────▶ work(&token) -> T
//!        ...returns Outcome::Pending(id)            │
//!                                                   │ completion channel
//!  Engine::pump ◀───────────────────────────────────┘
//!   └─▶ task.then(&mut Editor, T)   (may open a transaction)
//! ```
//!
//! `work` must be `Send` and never sees the editor; only `then` touches the
//! document, and it runs on the interactive thread in completion order.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use web_time::{Duration, Instant};

use crate::context::Editor;
use crate::error::{CommandError, CommandResult};

// ============================================================================
// Job ids
// ============================================================================

/// Identifies one background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cloneable, thread-safe cancellation signal observed by background work.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationInner>,
}

/// Control handle that triggers cancellation. Dropping it does not cancel.
pub struct CancellationSource {
    inner: Arc<CancellationInner>,
}

struct CancellationInner {
    cancelled: AtomicBool,
    notify: (Mutex<()>, Condvar),
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancellationSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationInner {
                cancelled: AtomicBool::new(false),
                notify: (Mutex::new(()), Condvar::new()),
            }),
        }
    }

    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Signal cancellation and wake pending `wait_timeout` calls.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        let (lock, cvar) = &self.inner.notify;
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        cvar.notify_all();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation was requested. For `?` at safe
    /// points inside background work.
    pub fn check(&self) -> CommandResult<()> {
        if self.is_cancelled() {
            Err(CommandError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Block until cancelled or `duration` elapses. Returns `true` if
    /// cancelled.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let (lock, cvar) = &self.inner.notify;
        let mut guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let start = Instant::now();
        let mut remaining = duration;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let (next, result) = cvar
                .wait_timeout(guard, remaining)
                .unwrap_or_else(|e| e.into_inner());
            guard = next;
            if self.is_cancelled() {
                return true;
            }
            if result.timed_out() {
                return false;
            }
            let elapsed = start.elapsed();
            if elapsed >= duration {
                return false;
            }
            remaining = duration - elapsed;
        }
    }
}

// ============================================================================
// Background tasks
// ============================================================================

pub(crate) type AnyResult = CommandResult<Box<dyn Any + Send>>;
type WorkFn = Box<dyn FnOnce(&CancellationToken) -> AnyResult + Send>;
pub(crate) type ThenFn = Box<dyn FnOnce(&mut Editor, Box<dyn Any + Send>) -> CommandResult<()>>;

/// Off-thread work plus its continuation on the interactive thread.
pub struct BackgroundTask {
    pub(crate) label: String,
    pub(crate) work: WorkFn,
    pub(crate) then: ThenFn,
}

impl fmt::Debug for BackgroundTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundTask")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl BackgroundTask {
    /// `work` runs on a worker with a cancellation token; `then` receives its
    /// value on the interactive thread.
    pub fn new<T, W, C>(label: &str, work: W, then: C) -> Self
    where
        T: Send + 'static,
        W: FnOnce(&CancellationToken) -> CommandResult<T> + Send + 'static,
        C: FnOnce(&mut Editor, T) -> CommandResult<()> + 'static,
    {
        Self {
            label: label.to_owned(),
            work: Box::new(move |token| work(token).map(|v| Box::new(v) as Box<dyn Any + Send>)),
            then: Box::new(move |editor, value| {
                let value = value.downcast::<T>().map_err(|_| {
                    CommandError::Invariant("background result has an unexpected type".to_owned())
                })?;
                then(editor, *value)
            }),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

// ============================================================================
// Worker pool
// ============================================================================

type Job = Box<dyn FnOnce() + Send>;

/// Fixed pool of threads fed from one job channel.
pub(crate) struct WorkerPool {
    jobs: Option<mpsc::Sender<Job>>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn new(threads: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let threads = (0..threads.max(1))
            .filter_map(|n| {
                let rx = Arc::clone(&rx);
                thread::Builder::new()
                    .name(format!("subcue-worker-{n}"))
                    .spawn(move || {
                        loop {
                            let job = {
                                let guard = rx.lock().unwrap_or_else(|e| e.into_inner());
                                guard.recv()
                            };
                            match job {
                                Ok(job) => job(),
                                Err(_) => break,
                            }
                        }
                        tracing::debug!(target: "subcue.worker", worker = n, "worker stopped");
                    })
                    .map_err(|err| {
                        tracing::error!(target: "subcue.worker", %err, "cannot spawn worker");
                    })
                    .ok()
            })
            .collect();
        Self {
            jobs: Some(tx),
            threads,
        }
    }

    /// Run `work` on a worker and send its result to `done`.
    pub(crate) fn submit(
        &self,
        id: JobId,
        work: WorkFn,
        token: CancellationToken,
        done: mpsc::Sender<(JobId, AnyResult)>,
    ) -> CommandResult<()> {
        let job: Job = Box::new(move || {
            let result = catch_unwind(AssertUnwindSafe(|| work(&token)))
                .unwrap_or_else(|payload| Err(CommandError::Panicked(panic_message(&payload))));
            tracing::debug!(target: "subcue.worker", job = %id, ok = result.is_ok(), "job finished");
            let _ = done.send((id, result));
        });
        let sender = self
            .jobs
            .as_ref()
            .ok_or_else(|| CommandError::unavailable("worker pool is shut down"))?;
        if self.threads.is_empty() {
            return Err(CommandError::unavailable("no background workers"));
        }
        sender
            .send(job)
            .map_err(|_| CommandError::unavailable("worker pool is shut down"))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.jobs.take();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Text of a panic payload.
pub(crate) fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_propagates_to_all_tokens() {
        let source = CancellationSource::new();
        let t1 = source.token();
        let t2 = t1.clone();
        assert!(!t1.is_cancelled());
        assert!(t2.check().is_ok());
        source.cancel();
        assert!(t1.is_cancelled());
        assert_eq!(t2.check(), Err(CommandError::Cancelled));
    }

    #[test]
    fn drop_source_does_not_cancel() {
        let source = CancellationSource::new();
        let token = source.token();
        drop(source);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn wait_timeout_times_out_or_wakes() {
        let source = CancellationSource::new();
        let token = source.token();
        assert!(!token.wait_timeout(Duration::from_millis(10)));
        let waiter = {
            let token = token.clone();
            thread::spawn(move || token.wait_timeout(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        source.cancel();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn pool_runs_jobs_and_reports_panics() {
        let pool = WorkerPool::new(2);
        let (tx, rx) = mpsc::channel();
        let ok: WorkFn = Box::new(|_| Ok(Box::new(7_i32) as Box<dyn Any + Send>));
        let boom: WorkFn = Box::new(|_| panic!("kaput"));
        pool.submit(JobId::new(1), ok, CancellationSource::new().token(), tx.clone())
            .unwrap();
        pool.submit(JobId::new(2), boom, CancellationSource::new().token(), tx)
            .unwrap();
        let mut results = vec![
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        ];
        results.sort_by_key(|(id, _)| *id);
        let value = results[0].1.as_ref().unwrap().downcast_ref::<i32>().copied();
        assert_eq!(value, Some(7));
        assert_eq!(
            results[1].1.as_ref().err(),
            Some(&CommandError::Panicked("kaput".to_owned()))
        );
    }

    #[test]
    fn background_task_downcasts_result() {
        let task = BackgroundTask::new(
            "count",
            |_| Ok(3_usize),
            |editor: &mut Editor, n: usize| {
                editor.audio.view_end = n as i64;
                Ok(())
            },
        );
        assert_eq!(task.label(), "count");
        let value = (task.work)(&CancellationSource::new().token()).unwrap();
        let mut editor = Editor::headless();
        (task.then)(&mut editor, value).unwrap();
        assert_eq!(editor.audio.view_end, 3);
    }
}
