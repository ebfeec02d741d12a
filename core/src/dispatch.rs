//! Execution contexts that completion callbacks are delivered on.
//!
//! # Design
//! The client never runs a caller's callback on its worker runtime. It wraps
//! the callback in a `Job` and hands it to the `ExecutionContext` it was
//! built with. A UI toolkit plugs in by draining a `MainLoop` from its own
//! event loop; `DedicatedThread` does the same on a thread of its own.
//!
//! Every context runs jobs one at a time in submission order.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait ExecutionContext: Send + Sync + 'static {
    fn execute(&self, job: Job);
}

/// Runs jobs on whichever thread submits them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl ExecutionContext for Immediate {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Sending half of a job queue whose receiving half is drained by one thread.
#[derive(Debug, Clone)]
pub struct MainQueue {
    tx: mpsc::Sender<Job>,
}

/// Receiving half of a `MainQueue`. Owned by the thread jobs should run on.
pub struct MainLoop {
    rx: mpsc::Receiver<Job>,
}

impl MainQueue {
    pub fn channel() -> (MainQueue, MainLoop) {
        let (tx, rx) = mpsc::channel();
        (MainQueue { tx }, MainLoop { rx })
    }
}

impl ExecutionContext for MainQueue {
    fn execute(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!("main loop is gone; dropping completion");
        }
    }
}

impl MainLoop {
    /// Run every job already queued, without waiting. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for one job and run it.
    pub fn run_one(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(job) => {
                job();
                true
            }
            Err(_) => false,
        }
    }

    /// Run jobs until every `MainQueue` handle has been dropped.
    pub fn run(self) {
        for job in self.rx {
            job();
        }
    }
}

/// A named thread that runs a `MainLoop` until the context is dropped.
///
/// Dropping joins the thread, except from inside a tokio runtime or from the
/// thread itself, where it is detached instead.
pub struct DedicatedThread {
    queue: Option<MainQueue>,
    handle: Option<JoinHandle<()>>,
}

impl DedicatedThread {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (queue, main_loop) = MainQueue::channel();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || main_loop.run())?;
        Ok(Self {
            queue: Some(queue),
            handle: Some(handle),
        })
    }
}

impl ExecutionContext for DedicatedThread {
    fn execute(&self, job: Job) {
        if let Some(queue) = &self.queue {
            queue.execute(job);
        }
    }
}

impl Drop for DedicatedThread {
    fn drop(&mut self) {
        // Closing the queue ends the loop once queued jobs have run.
        self.queue.take();
        let Some(handle) = self.handle.take() else {
            return;
        };
        // Never park the loop's own thread or an async worker on the join;
        // the thread still drains its queue and exits on its own.
        let on_own_thread = handle.thread().id() == thread::current().id();
        if on_own_thread || tokio::runtime::Handle::try_current().is_ok() {
            debug!("detaching main loop thread");
            return;
        }
        let _ = handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn immediate_runs_inline() {
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        Immediate.execute(Box::new(move || *h.lock().unwrap() += 1));
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn main_loop_runs_jobs_in_order_when_drained() {
        let (queue, main_loop) = MainQueue::channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let seen = seen.clone();
            queue.execute(Box::new(move || seen.lock().unwrap().push(i)));
        }
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(main_loop.run_pending(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn dedicated_thread_runs_on_named_thread() {
        let ctx = DedicatedThread::spawn("items-main").unwrap();
        let (tx, rx) = mpsc::channel();
        ctx.execute(Box::new(move || {
            tx.send(thread::current().name().map(str::to_string)).unwrap();
        }));
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("items-main"));
    }

    #[test]
    fn drop_inside_runtime_does_not_wait_for_busy_loop() {
        let ctx = DedicatedThread::spawn("items-busy").unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel();
        ctx.execute(Box::new(move || {
            let _ = release_rx.recv();
            done_tx.send(()).unwrap();
        }));

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async move { drop(ctx) });

        // The queued job still runs once the loop is free.
        release_tx.send(()).unwrap();
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    #[test]
    fn drop_outside_runtime_joins_after_queued_jobs() {
        let ctx = DedicatedThread::spawn("items-join").unwrap();
        let ran = Arc::new(Mutex::new(false));
        let r = ran.clone();
        ctx.execute(Box::new(move || {
            thread::sleep(Duration::from_millis(50));
            *r.lock().unwrap() = true;
        }));
        drop(ctx);
        assert!(*ran.lock().unwrap());
    }
}
