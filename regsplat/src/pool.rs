//! A pool of reusable worker threads.
//!
//! Workers block on a counting semaphore, pop exactly one task under the
//! queue lock per wakeup and run it to completion. Dropping the pool signals
//! stop and releases one permit per worker, so a worker only exits once it
//! observes the queue fully drained; tasks enqueued before the drop always
//! complete.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use log::debug;

use crate::error::{Error, Result};
use crate::system;

/// Information about the worker executing a task.
#[derive(Clone, Copy, Debug)]
pub struct ThreadInfo {
    /// Index of the worker within the pool.
    pub index: usize,
}

type Task = Box<dyn FnOnce(&ThreadInfo) + Send + 'static>;

/// Counting semaphore built on a mutex and a condition variable.
struct Semaphore {
    permits: Mutex<usize>,
    signal: Condvar,
}

impl Semaphore {
    fn new() -> Self {
        Self {
            permits: Mutex::new(0),
            signal: Condvar::new(),
        }
    }

    fn acquire(&self) {
        let mut permits = self.permits.lock().unwrap();
        while *permits == 0 {
            permits = self.signal.wait(permits).unwrap();
        }
        *permits -= 1;
    }

    fn release(&self, count: usize) {
        *self.permits.lock().unwrap() += count;
        if count == 1 {
            self.signal.notify_one();
        } else {
            self.signal.notify_all();
        }
    }
}

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    tasks: Semaphore,
    stop: AtomicBool,
}

/// Completion handle of an enqueued task.
pub struct TaskHandle<R> {
    receiver: mpsc::Receiver<R>,
}

impl<R> TaskHandle<R> {
    /// Block until the task finishes and take its result.
    pub fn wait(self) -> Result<R> {
        self.receiver.recv().map_err(|_| {
            Error::System(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "worker dropped the task result",
            ))
        })
    }
}

pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn a pool of `size` workers.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidParameter("thread pool size must be positive"));
        }
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            tasks: Semaphore::new(),
            stop: AtomicBool::new(false),
        });
        let workers = (0..size)
            .map(|index| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("regsplat-worker-{index}"))
                    .spawn(move || worker_loop(&shared, ThreadInfo { index }))
            })
            .collect::<io::Result<Vec<_>>>()?;
        debug!("thread pool spawned with {size} workers");
        Ok(Self { shared, workers })
    }

    /// Number of workers in the pool.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Push one task and wake one worker.
    pub fn enqueue<F, R>(&self, task: F) -> TaskHandle<R>
    where
        F: FnOnce(&ThreadInfo) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (handle, task) = Self::package(task);
        self.shared.queue.lock().unwrap().push_back(task);
        self.shared.tasks.release(1);
        handle
    }

    /// Push every task under one queue lock and release the semaphore once
    /// for the whole batch.
    pub fn enqueue_all<F, R, I>(&self, tasks: I) -> Vec<TaskHandle<R>>
    where
        F: FnOnce(&ThreadInfo) -> R + Send + 'static,
        R: Send + 'static,
        I: IntoIterator<Item = F>,
    {
        let (handles, tasks): (Vec<_>, Vec<_>) =
            tasks.into_iter().map(Self::package).unzip();
        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.extend(tasks);
        }
        self.shared.tasks.release(handles.len());
        handles
    }

    /// Apply a priority in `[0, 255]` to every worker.
    pub fn set_priority(&self, priority: u8) -> Result<()> {
        for worker in &self.workers {
            system::set_thread_priority(system::thread_of(worker), priority)?;
        }
        Ok(())
    }

    /// Restrict every worker to the CPUs set in `mask`.
    pub fn set_affinity_mask(&self, mask: u64) -> Result<()> {
        for worker in &self.workers {
            system::set_thread_affinity(system::thread_of(worker), mask)?;
        }
        Ok(())
    }

    fn package<F, R>(task: F) -> (TaskHandle<R>, Task)
    where
        F: FnOnce(&ThreadInfo) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let task: Task = Box::new(move |info| {
            // The receiver may have been dropped when the caller does not
            // care about the result; the task still runs.
            let _ = sender.send(task(info));
        });
        (TaskHandle { receiver }, task)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        // Workers sleeping on the semaphore need one extra wakeup each to
        // observe the stop flag against a drained queue.
        self.shared.tasks.release(self.workers.len());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: &Shared, info: ThreadInfo) {
    loop {
        shared.tasks.acquire();
        let task = {
            let mut queue = shared.queue.lock().unwrap();
            match queue.pop_front() {
                Some(task) => task,
                None => {
                    debug_assert!(shared.stop.load(Ordering::SeqCst));
                    return;
                }
            }
        };
        task(&info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(
            ThreadPool::new(0),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn tasks_return_results() {
        let pool = ThreadPool::new(2).unwrap();
        let handles: Vec<_> = (0..16u64)
            .map(|i| pool.enqueue(move |_| i * i))
            .collect();
        let results: Vec<u64> = handles.into_iter().map(|h| h.wait().unwrap()).collect();
        assert_eq!(results, (0..16u64).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn thread_info_indices_are_in_range() {
        let pool = ThreadPool::new(3).unwrap();
        let handles = pool.enqueue_all((0..32).map(|_| |info: &ThreadInfo| info.index));
        for handle in handles {
            assert!(handle.wait().unwrap() < 3);
        }
    }

    #[test]
    fn queued_tasks_complete_before_drop() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = ThreadPool::new(2).unwrap();
            for _ in 0..64 {
                let counter = Arc::clone(&counter);
                // Results are intentionally discarded; the drop still waits.
                drop(pool.enqueue(move |_| {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                    counter.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn single_worker_runs_fifo() {
        let pool = ThreadPool::new(1).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        let handles: Vec<_> = (0..8usize)
            .map(|i| {
                let order = Arc::clone(&order);
                pool.enqueue(move |_| order.lock().unwrap().push(i))
            })
            .collect();
        for handle in handles {
            handle.wait().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), (0..8).collect::<Vec<_>>());
    }
}
