//! Bounded streaming pipeline and work-stealing thread pool.
//!
//! This plays the role teacher's `vendor/cue` crate played for `mtsv`: a
//! small, self-contained parallel-pipeline primitive that the rest of the
//! crate builds its concurrency on, rather than reaching for a full async
//! runtime. Unlike `cue`, the pipeline here is explicitly bounded (a fixed
//! channel capacity) so that back-pressure is visible at the type level,
//! matching the "explicit bounded queues between stages" design note.

use crossbeam_channel::{bounded, Receiver, Sender};
use crossbeam_deque::{Injector, Stealer, Worker};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// A shared flag polled by workers at query and DP-batch boundaries (spec
/// section 5, "Cancellation and timeouts"). Cheap to clone and check.
#[derive(Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Cancellation(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run `f` over every item of `input` using `threads` workers, returning
/// results as they complete (not necessarily in input order — callers that
/// need input order, e.g. the output sink, re-impose it themselves).
///
/// The output channel has capacity `threads * 2`: a slow consumer blocks
/// producers rather than letting results pile up unbounded in memory, the
/// same back-pressure contract the hit buffer and `ReorderQueue` rely on.
pub fn pipeline<T, R, F>(threads: usize, input: Vec<T>, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let threads = threads.max(1);
    let injector = Injector::new();
    for item in input {
        injector.push(item);
    }
    let injector = Arc::new(injector);

    let (tx, rx): (Sender<R>, Receiver<R>) = bounded(threads * 2);

    thread::scope(|scope| {
        for _ in 0..threads {
            let injector = Arc::clone(&injector);
            let tx = tx.clone();
            let f = &f;
            scope.spawn(move || {
                let local: Worker<T> = Worker::new_fifo();
                loop {
                    let task = local.pop().or_else(|| loop {
                        match injector.steal() {
                            crossbeam_deque::Steal::Success(t) => break Some(t),
                            crossbeam_deque::Steal::Empty => break None,
                            crossbeam_deque::Steal::Retry => continue,
                        }
                    });
                    match task {
                        Some(item) => {
                            let result = f(item);
                            if tx.send(result).is_err() {
                                return;
                            }
                        }
                        None => return,
                    }
                }
            });
        }
        drop(tx);
    });

    rx.into_iter().collect()
}

/// A fixed-size pool of OS threads executing arbitrary boxed closures,
/// matching spec section 5's "single process-wide thread pool of size
/// `threads_`". Unlike [`pipeline`], jobs here don't produce a typed
/// result; they're used for fire-and-forget stage work (index building,
/// shard flushing) coordinated through other shared state.
pub struct WorkerPool {
    injector: Arc<Injector<Job>>,
    stealers: Vec<Stealer<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    active: Arc<AtomicUsize>,
}

type Job = Box<dyn FnOnce() + Send + 'static>;

impl WorkerPool {
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let injector = Arc::new(Injector::new());
        let mut workers = Vec::with_capacity(threads);
        let mut stealers = Vec::with_capacity(threads);
        for _ in 0..threads {
            let w = Worker::new_fifo();
            stealers.push(w.stealer());
            workers.push(w);
        }
        let active = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::with_capacity(threads);
        for w in workers {
            let injector = Arc::clone(&injector);
            let stealers_clone = stealers.clone();
            let active = Arc::clone(&active);
            handles.push(thread::spawn(move || {
                worker_loop(w, injector, stealers_clone, active);
            }));
        }
        WorkerPool {
            injector,
            stealers,
            handles,
            active,
        }
    }

    /// Enqueue a unit of work; may run on any idle worker.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.injector.push(Box::new(job));
    }

    /// Number of threads currently executing a job (not counting ones
    /// waiting for work).
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn thread_count(&self) -> usize {
        self.stealers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Sentinel: push one no-op terminator per thread so the loop below
        // can distinguish "queue empty, exiting" from "queue empty, more
        // work might still arrive" — see `worker_loop`'s shutdown check.
        for _ in 0..self.stealers.len() {
            self.injector.push(Box::new(|| {}));
        }
        for h in self.handles.drain(..) {
            let _ = h.join();
        }
    }
}

fn worker_loop(
    local: Worker<Job>,
    injector: Arc<Injector<Job>>,
    stealers: Vec<Stealer<Job>>,
    active: Arc<AtomicUsize>,
) {
    let mut idle_spins = 0u32;
    loop {
        let task = local.pop().or_else(|| steal_from(&injector, &local, &stealers));
        match task {
            Some(job) => {
                idle_spins = 0;
                active.fetch_add(1, Ordering::Relaxed);
                job();
                active.fetch_sub(1, Ordering::Relaxed);
            }
            None => {
                idle_spins += 1;
                if idle_spins > 4096 {
                    // No work anywhere and we've spun enough to believe it;
                    // yield the OS thread rather than busy-loop forever.
                    thread::yield_now();
                }
                if idle_spins > 1_000_000 {
                    return;
                }
            }
        }
    }
}

fn steal_from(
    injector: &Injector<Job>,
    local: &Worker<Job>,
    stealers: &[Stealer<Job>],
) -> Option<Job> {
    loop {
        match injector.steal_batch_and_pop(local) {
            crossbeam_deque::Steal::Success(job) => return Some(job),
            crossbeam_deque::Steal::Retry => continue,
            crossbeam_deque::Steal::Empty => break,
        }
    }
    for s in stealers {
        loop {
            match s.steal() {
                crossbeam_deque::Steal::Success(job) => return Some(job),
                crossbeam_deque::Steal::Retry => continue,
                crossbeam_deque::Steal::Empty => break,
            }
        }
    }
    None
}

/// A bounded producer/consumer channel, used by the hit buffer (shard
/// flush handoff) and the output sink (reorder-queue depth limit). Thin
/// wrapper so call sites don't depend on `crossbeam_channel` directly.
pub struct BoundedChannel<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> BoundedChannel<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        BoundedChannel { tx, rx }
    }

    pub fn sender(&self) -> Sender<T> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<T> {
        self.rx.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn pipeline_processes_all_items() {
        let input: Vec<u32> = (0..1000).collect();
        let mut out = pipeline(4, input, |x| x * 2);
        out.sort_unstable();
        let expect: Vec<u32> = (0..1000).map(|x| x * 2).collect();
        assert_eq!(out, expect);
    }

    #[test]
    fn worker_pool_runs_all_jobs() {
        let pool = WorkerPool::new(3);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..200 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 200);
    }

    #[test]
    fn cancellation_flag_is_observed() {
        let flag = Cancellation::new();
        assert!(!flag.is_cancelled());
        let flag2 = flag.clone();
        flag2.cancel();
        assert!(flag.is_cancelled());
    }
}
