use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::error;

use crate::server_common::{Result, ServerError};
use crate::thread_pool::pool::ThreadPool;

type Task = Box<dyn FnOnce() + 'static + Send>;

/// Lives on the stack of a worker; when the worker unwinds from a panicking task,
/// it recruits a replacement reading the same queue.
struct Sentinel {
    index: usize,
    tasks: Receiver<Task>,
}

impl Drop for Sentinel {
    fn drop(&mut self) {
        if thread::panicking() {
            error!(target: "app::error", "worker {} panicked, we are recruiting a new one now!", self.index);
            if let Err(err) = spawn_worker(self.index, self.tasks.clone()) {
                error!(target: "app::error", "failed to recruit worker {}: {}", self.index, err);
            }
        }
    }
}

fn spawn_worker(index: usize, tasks: Receiver<Task>) -> std::io::Result<()> {
    thread::Builder::new()
        .name(format!("shared-queue-worker-{}", index))
        .spawn(move || {
            let _sentinel = Sentinel {
                index,
                tasks: tasks.clone(),
            };
            for task in tasks.iter() {
                task();
            }
        })?;
    Ok(())
}

/// A fixed set of workers sharing one task queue.
///
/// Dropping the last handle closes the queue: tasks already queued still run,
/// then the workers exit.
#[derive(Clone)]
pub struct SharedQueueThreadPool {
    tasks: Sender<Task>,
}

impl ThreadPool for SharedQueueThreadPool {
    fn spawn<R>(&self, runnable: R)
    where
        R: 'static + Send + FnOnce(),
    {
        if self.tasks.send(Box::new(runnable)).is_err() {
            error!(target: "app::error", "Trying to spawn a task while no worker is alive.");
        }
    }

    fn new(size: usize) -> Result<Self> {
        let (tasks, queue) = unbounded::<Task>();
        for index in 0..size.max(1) {
            spawn_worker(index, queue.clone()).map_err(|e| ServerError::PoolBuild {
                reason: format!("{}", e),
            })?;
        }
        Ok(SharedQueueThreadPool { tasks })
    }
}
