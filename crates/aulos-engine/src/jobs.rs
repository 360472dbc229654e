// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The engine-internal job worker pool.
//!
//! Pure infrastructure: the engine core dispatches its parallelizable work
//! here, callers never schedule jobs directly. Jobs carry a category, and
//! the number of concurrently running jobs per category is capped below the
//! pool size so that one category cannot oversubscribe the workers.
//!
//! `stop` closes the queue and joins every worker. In-flight and queued
//! jobs run to completion; nothing is cancelled, the pool simply stops
//! accepting new submissions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use aulos_core::error::PoolError;
use aulos_core::settings::MAX_WORKER_THREADS;

/// Categories of engine-internal work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobCategory {
    /// Voice start and playback bookkeeping.
    Playback,
    /// Music clock and transition work.
    Music,
    /// Spatial emitter and geometry work.
    Spatial,
}

const CATEGORY_COUNT: usize = 3;

impl JobCategory {
    fn index(self) -> usize {
        match self {
            JobCategory::Playback => 0,
            JobCategory::Music => 1,
            JobCategory::Spatial => 2,
        }
    }
}

/// A unit of engine-internal work.
pub struct Job {
    category: JobCategory,
    run: Box<dyn FnOnce() + Send + 'static>,
}

impl Job {
    /// Creates a job in the given category.
    pub fn new(category: JobCategory, run: impl FnOnce() + Send + 'static) -> Self {
        Self {
            category,
            run: Box::new(run),
        }
    }
}

/// Per-category concurrency gate.
#[derive(Debug)]
struct CategorySlots {
    active: Mutex<[u32; CATEGORY_COUNT]>,
    freed: Condvar,
    limit: u32,
}

impl CategorySlots {
    fn acquire(&self, category: JobCategory) {
        let mut active = self.active.lock().unwrap();
        while active[category.index()] >= self.limit {
            active = self.freed.wait(active).unwrap();
        }
        active[category.index()] += 1;
    }

    fn release(&self, category: JobCategory) {
        let mut active = self.active.lock().unwrap();
        active[category.index()] -= 1;
        drop(active);
        self.freed.notify_all();
    }
}

/// A fixed-size pool of worker threads for engine-internal jobs.
pub struct JobWorkerPool {
    sender: Mutex<Option<flume::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    slots: Arc<CategorySlots>,
    pending: Arc<AtomicU64>,
    worker_count: usize,
}

impl JobWorkerPool {
    /// Starts `worker_count` workers (at least one; the zero-worker
    /// configuration is handled by the engine core running jobs inline and
    /// never constructs a pool).
    ///
    /// `per_category_limit` caps how many jobs of one category run at once.
    pub fn start(worker_count: usize, per_category_limit: u32) -> Result<Arc<Self>, PoolError> {
        if worker_count == 0 || worker_count > MAX_WORKER_THREADS {
            return Err(PoolError::TooManyWorkers {
                requested: worker_count,
                max: MAX_WORKER_THREADS,
            });
        }

        let (sender, receiver) = flume::unbounded::<Job>();
        let slots = Arc::new(CategorySlots {
            active: Mutex::new([0; CATEGORY_COUNT]),
            freed: Condvar::new(),
            limit: per_category_limit.max(1),
        });
        let pending = Arc::new(AtomicU64::new(0));

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let receiver = receiver.clone();
            let slots = Arc::clone(&slots);
            let pending = Arc::clone(&pending);
            let handle = std::thread::Builder::new()
                .name(format!("aulos-worker-{index}"))
                .spawn(move || {
                    for job in receiver.iter() {
                        slots.acquire(job.category);
                        (job.run)();
                        slots.release(job.category);
                        pending.fetch_sub(1, Ordering::AcqRel);
                    }
                })
                .map_err(|spawn_err| {
                    // Already spawned workers drain and exit once `sender`
                    // and the pool are dropped with them.
                    PoolError::SpawnFailed(spawn_err.to_string())
                })?;
            workers.push(handle);
        }

        log::info!(
            "Job worker pool started ({worker_count} workers, {} active per category).",
            per_category_limit.max(1)
        );
        Ok(Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            slots,
            pending,
            worker_count,
        }))
    }

    /// Enqueues a job. Jobs submitted after [`stop`](Self::stop) are
    /// rejected and dropped.
    pub fn submit(&self, job: Job) {
        let sender = self.sender.lock().unwrap();
        match sender.as_ref() {
            Some(sender) => {
                self.pending.fetch_add(1, Ordering::AcqRel);
                if sender.send(job).is_err() {
                    self.pending.fetch_sub(1, Ordering::AcqRel);
                    log::error!("Worker queue disconnected; job dropped.");
                }
            }
            None => log::warn!("Job submitted after pool stop; dropped."),
        }
    }

    /// Jobs queued or running.
    pub fn pending_jobs(&self) -> u64 {
        self.pending.load(Ordering::Acquire)
    }

    /// The number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Stops accepting submissions, drains the queue, and joins every
    /// worker. Safe to call more than once.
    pub fn stop(&self) {
        let sender = self.sender.lock().unwrap().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        for handle in workers {
            if handle.join().is_err() {
                log::error!("A worker thread panicked during drain.");
            }
        }
        log::info!("Job worker pool drained and stopped.");
    }

    #[cfg(test)]
    fn slots(&self) -> Arc<CategorySlots> {
        Arc::clone(&self.slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[test]
    fn zero_workers_is_not_a_valid_pool() {
        assert!(matches!(
            JobWorkerPool::start(0, 2),
            Err(PoolError::TooManyWorkers { .. })
        ));
    }

    #[test]
    fn worker_count_above_platform_cap_is_rejected() {
        assert!(matches!(
            JobWorkerPool::start(MAX_WORKER_THREADS + 1, 2),
            Err(PoolError::TooManyWorkers { .. })
        ));
    }

    #[test]
    fn stop_drains_all_queued_jobs() {
        let pool = JobWorkerPool::start(2, 2).unwrap();
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..32 {
            let counter = Arc::clone(&counter);
            pool.submit(Job::new(JobCategory::Playback, move || {
                counter.fetch_add(1, Ordering::AcqRel);
            }));
        }
        pool.stop();

        assert_eq!(counter.load(Ordering::Acquire), 32);
        assert_eq!(pool.pending_jobs(), 0);
    }

    #[test]
    fn submissions_after_stop_are_dropped() {
        let pool = JobWorkerPool::start(1, 1).unwrap();
        pool.stop();

        let counter = Arc::new(AtomicU32::new(0));
        let inner = Arc::clone(&counter);
        pool.submit(Job::new(JobCategory::Playback, move || {
            inner.fetch_add(1, Ordering::AcqRel);
        }));
        assert_eq!(counter.load(Ordering::Acquire), 0);
    }

    #[test]
    fn per_category_limit_bounds_concurrency() {
        let pool = JobWorkerPool::start(4, 1).unwrap();
        let running = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.submit(Job::new(JobCategory::Music, move || {
                let now = running.fetch_add(1, Ordering::AcqRel) + 1;
                peak.fetch_max(now, Ordering::AcqRel);
                std::thread::sleep(Duration::from_millis(5));
                running.fetch_sub(1, Ordering::AcqRel);
            }));
        }
        pool.stop();

        assert_eq!(peak.load(Ordering::Acquire), 1);
    }

    #[test]
    fn slots_release_wakes_waiters() {
        let pool = JobWorkerPool::start(1, 1).unwrap();
        let slots = pool.slots();
        slots.acquire(JobCategory::Spatial);
        slots.release(JobCategory::Spatial);
        slots.acquire(JobCategory::Spatial);
        slots.release(JobCategory::Spatial);
        pool.stop();
    }
}
