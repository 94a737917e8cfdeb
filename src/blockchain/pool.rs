use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use super::PoolError;

pub const MAX_WORKERS: usize = 16;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of named worker threads fed from one shared queue.
///
/// The pool is owned by whoever creates it; there is no process-wide
/// registry. Dropping the pool shuts it down.
pub struct MiningPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

/// Awaits the result of one job submitted to a [`MiningPool`].
#[must_use]
pub struct JobHandle<T> {
    result: Receiver<thread::Result<T>>,
}

impl<T> JobHandle<T> {
    /// Block until the job finishes. A job that panicked, or that was
    /// discarded because the pool went away, yields `WorkerLost`.
    pub fn join(self) -> Result<T, PoolError> {
        match self.result.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) | Err(_) => Err(PoolError::WorkerLost),
        }
    }
}

impl MiningPool {
    pub fn new(size: usize) -> Result<Self, PoolError> {
        if size == 0 || size > MAX_WORKERS {
            return Err(PoolError::InvalidSize {
                got: size,
                max: MAX_WORKERS,
            });
        }

        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let rx = Arc::clone(&rx);
            let handle = thread::Builder::new()
                .name(format!("miner-{id}"))
                .spawn(move || worker_loop(id, rx))?;
            workers.push(handle);
        }
        info!("POOL - started {size} mining workers");

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            size,
        })
    }

    /// Queue `f` on the next free worker.
    pub fn spawn<F, T>(&self, f: F) -> Result<JobHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        let job: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(f));
            if outcome.is_err() {
                warn!("POOL - job panicked on {:?}", thread::current().name());
            }
            // The caller may have dropped its handle.
            let _ = done_tx.send(outcome);
        });

        let sender = self.sender.lock().expect("mutex poisoned");
        match sender.as_ref() {
            Some(tx) => tx.send(job).map_err(|_| PoolError::ShutDown)?,
            None => return Err(PoolError::ShutDown),
        }
        Ok(JobHandle { result: done_rx })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_running(&self) -> bool {
        self.sender.lock().expect("mutex poisoned").is_some()
    }

    /// Stop accepting jobs, let queued ones drain, and join every worker.
    /// Calling it again is a no-op.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().expect("mutex poisoned").take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let workers: Vec<_> = self.workers.lock().expect("mutex poisoned").drain(..).collect();
        let current = thread::current().id();
        for handle in workers {
            // A job may own the last reference to the pool.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("POOL - worker exited abnormally");
            }
        }
        info!("POOL - all mining workers stopped");
    }
}

impl Drop for MiningPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, jobs: Arc<Mutex<Receiver<Job>>>) {
    loop {
        let next = match jobs.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => break,
        };
        match next {
            Ok(job) => {
                debug!("POOL - worker {id} picked up a job");
                job();
            }
            Err(_) => break,
        }
    }
    debug!("POOL - worker {id} exiting");
}
