//! Task scheduling and synchronization
//!
//! Tasks are concurrent evaluations of script functions. A task with a Null
//! queue key runs on its own worker thread; tasks sharing a non-null queue
//! key are handed to a per-key worker and execute in submission order.
//!
//! The module also owns the two process-wide registries the `synchronize`
//! and `task_count` builtins rely on: the named-lock map and the
//! unfinished-task counters. Both grow with the program's key vocabulary and
//! never shrink.

use crate::value::{RuntimeError, Value};
use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, LazyLock, Mutex};
use std::thread;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unfinished-task counters, keyed by queue key (Null included)
static PENDING: LazyLock<DashMap<Value, u64>> = LazyLock::new(DashMap::new);

/// Per-queue-key workers. A worker thread is created on first submission for
/// a key and then serves that key for the rest of the process.
static QUEUES: LazyLock<DashMap<Value, mpsc::Sender<Job>>> = LazyLock::new(DashMap::new);

/// Named locks for `synchronize`. The Null key addresses the default lock.
static LOCKS: LazyLock<DashMap<Value, Arc<ReentrantMutex<()>>>> = LazyLock::new(DashMap::new);

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Not finished yet
    Pending,
    /// Finished with a value
    Finished,
    /// Finished with an error
    Failed,
}

/// Inner task state shared between the handle and the worker
struct TaskState {
    id: u64,
    queue: Value,
    result: Mutex<Option<Result<Value, RuntimeError>>>,
    done: Condvar,
}

impl TaskState {
    fn finish(&self, result: Result<Value, RuntimeError>) {
        let mut slot = self.result.lock().unwrap();
        if slot.is_none() {
            *slot = Some(result);
        }
        self.done.notify_all();
    }
}

/// Handle to a scheduled task
///
/// Cheap to clone; all clones observe the same task. Completion is monotone:
/// once finished, the stored result never changes, so `join` and `value` are
/// idempotent.
#[derive(Clone)]
pub struct TaskHandle {
    state: Arc<TaskState>,
}

impl TaskHandle {
    fn new(queue: Value) -> Self {
        let id = TASK_ID_COUNTER.fetch_add(1, Ordering::SeqCst);
        TaskHandle {
            state: Arc::new(TaskState {
                id,
                queue,
                result: Mutex::new(None),
                done: Condvar::new(),
            }),
        }
    }

    /// Get task ID
    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// The queue key this task was submitted under
    pub fn queue(&self) -> &Value {
        &self.state.queue
    }

    pub fn status(&self) -> TaskStatus {
        match &*self.state.result.lock().unwrap() {
            None => TaskStatus::Pending,
            Some(Ok(_)) => TaskStatus::Finished,
            Some(Err(_)) => TaskStatus::Failed,
        }
    }

    /// Whether the task has finished, successfully or not
    pub fn is_finished(&self) -> bool {
        self.state.result.lock().unwrap().is_some()
    }

    /// Non-blocking read of the stored outcome
    pub fn value(&self) -> Option<Result<Value, RuntimeError>> {
        self.state.result.lock().unwrap().clone()
    }

    /// Block until the task finishes and return its outcome
    pub fn join(&self) -> Result<Value, RuntimeError> {
        let mut slot = self.state.result.lock().unwrap();
        while slot.is_none() {
            slot = self.state.done.wait(slot).unwrap();
        }
        slot.clone().unwrap_or(Ok(Value::Null))
    }

    /// Identity comparison: two handles are the same task iff they share state
    pub fn same_task(&self, other: &TaskHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id())
            .field("queue", self.queue())
            .field("status", &self.status())
            .finish()
    }
}

/// Schedule a task.
///
/// `queue` of Null runs the job on a dedicated thread; any other key routes
/// it to that key's worker, serializing it after previously submitted tasks
/// with the same key.
pub fn submit<F>(queue: Value, job: F) -> TaskHandle
where
    F: FnOnce() -> Result<Value, RuntimeError> + Send + 'static,
{
    let handle = TaskHandle::new(queue.clone());
    *PENDING.entry(queue.clone()).or_insert(0) += 1;

    let state = Arc::clone(&handle.state);
    let run: Job = Box::new(move || {
        tracing::debug!(task = state.id, "task started");
        let result = job();
        if let Err(ref error) = result {
            tracing::debug!(task = state.id, %error, "task failed");
        } else {
            tracing::debug!(task = state.id, "task finished");
        }
        // Drop the pending count before publishing the result so a joiner
        // that wakes immediately already observes the updated count.
        if let Some(mut count) = PENDING.get_mut(&state.queue) {
            *count = count.saturating_sub(1);
        }
        state.finish(result);
    });

    if matches!(queue, Value::Null) {
        thread::spawn(run);
    } else {
        let sender = QUEUES
            .entry(queue)
            .or_insert_with(|| {
                let (tx, rx) = mpsc::channel::<Job>();
                thread::spawn(move || {
                    for job in rx {
                        job();
                    }
                });
                tx
            })
            .clone();
        // The receiver lives for the process; send cannot fail
        let _ = sender.send(run);
    }

    handle
}

/// Number of unfinished tasks across every queue
pub fn task_count() -> u64 {
    PENDING.iter().map(|entry| *entry.value()).sum()
}

/// Number of unfinished tasks submitted under `queue`
pub fn task_count_for(queue: &Value) -> u64 {
    PENDING.get(queue).map(|count| *count).unwrap_or(0)
}

/// The reentrant lock registered for `key`, created on first use.
/// Entries are never removed.
pub fn lock_for(key: &Value) -> Arc<ReentrantMutex<()>> {
    LOCKS
        .entry(key.clone())
        .or_insert_with(|| Arc::new(ReentrantMutex::new(())))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_submit_parallel_task() {
        let handle = submit(Value::Null, || Ok(Value::Number(42.0)));
        assert!(handle.id() > 0);
        assert_eq!(handle.join(), Ok(Value::Number(42.0)));
        assert_eq!(handle.status(), TaskStatus::Finished);
    }

    #[test]
    fn test_join_is_idempotent() {
        let handle = submit(Value::Null, || Ok(Value::string("done")));
        assert_eq!(handle.join(), handle.join());
    }

    #[test]
    fn test_failed_task_stores_error() {
        let handle = submit(Value::Null, || {
            Err(RuntimeError::InvalidArgument {
                msg: "boom".to_string(),
                span: crate::span::Span::dummy(),
            })
        });
        assert!(handle.join().is_err());
        assert_eq!(handle.status(), TaskStatus::Failed);
        assert!(handle.is_finished());
    }

    #[test]
    fn test_value_is_non_blocking() {
        let handle = submit(Value::Null, || {
            thread::sleep(Duration::from_millis(100));
            Ok(Value::Null)
        });
        // Either None (still running) or the finished result; never blocks
        let _ = handle.value();
        handle.join().unwrap();
        assert_eq!(handle.value(), Some(Ok(Value::Null)));
    }

    #[test]
    fn test_queue_preserves_submission_order() {
        let key = Value::string("tasks-test-order");
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..8 {
            let log = Arc::clone(&log);
            handles.push(submit(key.clone(), move || {
                log.lock().unwrap().push(i);
                Ok(Value::Null)
            }));
        }
        for handle in &handles {
            handle.join().unwrap();
        }
        assert_eq!(*log.lock().unwrap(), (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_task_count_for_queue() {
        let key = Value::string("tasks-test-count");
        let handle = submit(key.clone(), || {
            thread::sleep(Duration::from_millis(50));
            Ok(Value::Null)
        });
        assert_eq!(task_count_for(&key), 1);
        handle.join().unwrap();
        assert_eq!(task_count_for(&key), 0);
    }

    #[test]
    fn test_lock_registry_returns_same_lock() {
        let a = lock_for(&Value::string("tasks-test-lock"));
        let b = lock_for(&Value::string("tasks-test-lock"));
        assert!(Arc::ptr_eq(&a, &b));
        // Reentrant: locking twice on the same thread does not deadlock
        let _outer = a.lock();
        let _inner = b.lock();
    }

    #[test]
    fn test_completion_is_monotone() {
        let handle = submit(Value::Null, || Ok(Value::Number(1.0)));
        handle.join().unwrap();
        assert!(handle.is_finished());
        thread::sleep(Duration::from_millis(10));
        assert!(handle.is_finished());
        assert_eq!(handle.value(), Some(Ok(Value::Number(1.0))));
    }
}
