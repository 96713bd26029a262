//! The serial execution context that the socket client runs on.
//!
//! A [`Looper`] is bound to the thread that created it. Everything that
//! touches client, provider or socket state must run on that thread;
//! [`Looper::ensure_running_on_looper`] turns a violation into a panic
//! instead of a silent data race. Other threads may [`post`](Looper::post)
//! tasks, which the owner runs with [`Looper::run_pending`].
//!
//! Work that captures the single-threaded client itself (an `Rc`, a
//! `RefCell`) cannot cross threads. Code already on the looper thread, such
//! as a socket callback that must not re-enter the client, defers it with
//! [`post_local`](Looper::post_local) instead.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

type Task = Box<dyn FnOnce() + Send + 'static>;
type LocalTask = Box<dyn FnOnce() + 'static>;

thread_local! {
    // Keyed by looper identity. Only the looper's own thread ever touches
    // its entry.
    static LOCAL_TASKS: RefCell<HashMap<usize, VecDeque<LocalTask>>> =
        RefCell::new(HashMap::new());
}

struct LooperInner {
    name: String,
    thread: ThreadId,
    tasks: Mutex<VecDeque<Task>>,
}

impl Drop for LooperInner {
    fn drop(&mut self) {
        if thread::current().id() != self.thread {
            return;
        }
        let key = self as *const LooperInner as usize;
        // Unrun local tasks are dropped outside the borrow; they may own
        // loopers themselves.
        let unrun = LOCAL_TASKS
            .try_with(|tasks| tasks.try_borrow_mut().ok().and_then(|mut t| t.remove(&key)))
            .ok()
            .flatten();
        drop(unrun);
    }
}

/// Handle to a single-threaded task queue. Clones share the same queue.
#[derive(Clone)]
pub struct Looper {
    inner: Arc<LooperInner>,
}

impl fmt::Debug for Looper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Looper")
            .field("name", &self.inner.name)
            .field("thread", &self.inner.thread)
            .finish()
    }
}

impl Looper {
    /// Creates a looper bound to the calling thread.
    pub fn new(name: impl Into<String>) -> Self {
        Looper {
            inner: Arc::new(LooperInner {
                name: name.into(),
                thread: thread::current().id(),
                tasks: Mutex::new(VecDeque::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_current_thread(&self) -> bool {
        thread::current().id() == self.inner.thread
    }

    /// Panics unless called on the looper's thread.
    #[track_caller]
    pub fn ensure_running_on_looper(&self) {
        if !self.is_current_thread() {
            panic!(
                "not running on looper '{}': expected thread {:?}, current thread {:?} ({})",
                self.inner.name,
                self.inner.thread,
                thread::current().id(),
                thread::current().name().unwrap_or("<unnamed>"),
            );
        }
    }

    /// Queues `task` to run on the looper thread. Callable from any thread.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        self.lock_tasks().push_back(Box::new(task));
    }

    /// Queues a task that may capture thread-bound state. Must be called on
    /// the looper thread; the task runs on the next
    /// [`run_pending`](Looper::run_pending).
    #[track_caller]
    pub fn post_local(&self, task: impl FnOnce() + 'static) {
        self.ensure_running_on_looper();
        let key = self.key();
        LOCAL_TASKS.with(|tasks| {
            tasks
                .borrow_mut()
                .entry(key)
                .or_default()
                .push_back(Box::new(task));
        });
    }

    /// Number of queued tasks, local ones included when called on the
    /// looper thread.
    pub fn pending_tasks(&self) -> usize {
        let local = if self.is_current_thread() {
            let key = self.key();
            LOCAL_TASKS.with(|tasks| tasks.borrow().get(&key).map_or(0, VecDeque::len))
        } else {
            0
        };
        self.lock_tasks().len() + local
    }

    /// Runs queued tasks until both queues are empty, including tasks posted
    /// while running. Each queue runs in FIFO order; tasks posted from other
    /// threads go first in every round. Returns the number of tasks run.
    #[track_caller]
    pub fn run_pending(&self) -> usize {
        self.ensure_running_on_looper();

        let mut count = 0;
        loop {
            // The lock is released before the task runs so tasks can post.
            let task = self.lock_tasks().pop_front();
            if let Some(task) = task {
                task();
                count += 1;
                continue;
            }
            match self.pop_local() {
                Some(task) => {
                    task();
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    /// Returns true if both handles refer to the same looper.
    pub fn ptr_eq(&self, other: &Looper) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn key(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    fn pop_local(&self) -> Option<LocalTask> {
        let key = self.key();
        LOCAL_TASKS.with(|tasks| {
            let mut tasks = tasks.borrow_mut();
            let queue = tasks.get_mut(&key)?;
            let task = queue.pop_front();
            if queue.is_empty() {
                tasks.remove(&key);
            }
            task
        })
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
        // A panicking task never holds the lock, so poisoning only happens
        // if push/pop themselves panic; the queue is still consistent then.
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
