//! Cooperative parallel dispatcher over a growable FIFO of work units.
//! Units may enqueue further units; ordering between units is not
//! guaranteed. The calling thread participates as a worker when the pool
//! size is <= 1 so progress is made even under a minimal executor.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use crate::error::Error;

/// How often (in loop iterations) a tight inner loop should poll for
/// interruption.
pub const INTERRUPTION_POLL_INTERVAL: usize = 1024;

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    /// Items currently queued or being processed by a worker; the queue is
    /// drained once this reaches zero.
    pending: AtomicUsize,
    interrupted: std::sync::Arc<AtomicBool>,
    failure: Mutex<Option<Error>>,
}

/// Handle passed to the processing closure, letting it enqueue further
/// units and check the cooperative interruption flag.
pub struct Submitter<'a, T> {
    shared: &'a Shared<T>,
}

impl<'a, T> Submitter<'a, T> {
    pub fn submit(&self, item: T) {
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        self.shared.queue.lock().expect("work queue mutex poisoned").push_back(item);
        self.shared.not_empty.notify_all();
    }

    pub fn is_interrupted(&self) -> bool {
        self.shared.interrupted.load(Ordering::SeqCst)
    }
}

/// An opaque handle external callers may use to request interruption.
#[derive(Clone)]
pub struct InterruptHandle {
    flag: std::sync::Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self {
            flag: std::sync::Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Default for InterruptHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `process` over `initial` and everything it transitively submits,
/// using `pool_size` worker threads (the calling thread included as a
/// worker when `pool_size <= 1`). Returns the first error raised by any
/// unit, if any; otherwise blocks until the queue drains. `interrupt` lets
/// an external caller cancel the scan from another thread.
pub fn run<T, F>(
    pool_size: usize,
    initial: Vec<T>,
    interrupt: InterruptHandle,
    process: F,
) -> Result<(), Error>
where
    T: Send + 'static,
    F: Fn(T, &Submitter<'_, T>) -> Result<(), Error> + Send + Sync,
{
    let pending = initial.len();
    let shared = Shared {
        queue: Mutex::new(VecDeque::from(initial)),
        not_empty: Condvar::new(),
        pending: AtomicUsize::new(pending),
        interrupted: interrupt.flag.clone(),
        failure: Mutex::new(None),
    };

    let worker_count = pool_size.max(1);
    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(worker_count.saturating_sub(1));
        for _ in 1..worker_count {
            let shared_ref = &shared;
            let process_ref = &process;
            handles.push(scope.spawn(move || worker_loop(shared_ref, process_ref)));
        }
        // The calling thread always participates; with pool_size <= 1 it is
        // the only worker.
        worker_loop(&shared, &process);
        for h in handles {
            let _ = h.join();
        }
    });

    let mut failure = shared.failure.lock().expect("work queue mutex poisoned");
    if let Some(err) = failure.take() {
        return Err(err);
    }
    if shared.interrupted.load(Ordering::SeqCst) {
        return Err(Error::new(crate::error::ErrorKind::ScanInterrupted));
    }
    Ok(())
}

fn worker_loop<T, F>(shared: &Shared<T>, process: &F)
where
    F: Fn(T, &Submitter<'_, T>) -> Result<(), Error>,
{
    loop {
        if shared.interrupted.load(Ordering::SeqCst) {
            return;
        }
        if shared.pending.load(Ordering::SeqCst) == 0 {
            return;
        }

        let item = {
            let mut queue = shared.queue.lock().expect("work queue mutex poisoned");
            loop {
                if let Some(item) = queue.pop_front() {
                    break Some(item);
                }
                if shared.pending.load(Ordering::SeqCst) == 0 || shared.interrupted.load(Ordering::SeqCst) {
                    break None;
                }
                let (guard, _) = shared
                    .not_empty
                    .wait_timeout(queue, std::time::Duration::from_millis(50))
                    .expect("work queue condvar poisoned");
                queue = guard;
            }
        };

        let Some(item) = item else { return };

        let submitter = Submitter { shared };
        match process(item, &submitter) {
            Ok(()) => {}
            Err(e) => {
                let mut failure = shared.failure.lock().expect("work queue mutex poisoned");
                if failure.is_none() {
                    *failure = Some(e);
                }
                shared.interrupted.store(true, Ordering::SeqCst);
            }
        }
        shared.pending.fetch_sub(1, Ordering::SeqCst);
        shared.not_empty.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as Counter;
    use std::sync::Arc;

    #[test]
    fn processes_all_units_including_submitted_children() {
        let processed = Arc::new(Counter::new(0));
        let counter = processed.clone();
        let result = run(4, vec![3usize], InterruptHandle::new(), move |n, submitter| {
            counter.fetch_add(1, Ordering::SeqCst);
            if n > 0 {
                submitter.submit(n - 1);
            }
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(processed.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn single_threaded_pool_caller_participates() {
        let processed = Arc::new(Counter::new(0));
        let counter = processed.clone();
        let result = run(1, vec![1usize, 2usize], InterruptHandle::new(), move |_n, _submitter| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(processed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn first_error_propagates_and_stops_remaining_work() {
        let result = run(2, vec![1usize, 2usize, 3usize], InterruptHandle::new(), |n, _submitter| {
            if n == 2 {
                Err(Error::new(crate::error::ErrorKind::WorkerFailed("boom".into())))
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
    }
}
