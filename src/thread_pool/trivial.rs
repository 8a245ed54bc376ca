use std::thread;

use log::error;

use crate::server_common::Result;

use super::pool::ThreadPool;

/// One fresh thread per task, threads are never reused.
/// Good enough for tests and tiny loads.
pub struct NaiveThreadPool;

impl ThreadPool for NaiveThreadPool {
    fn spawn<R>(&self, runnable: R)
    where
        R: 'static + Send + FnOnce(),
    {
        if let Err(err) = thread::Builder::new()
            .name("txseq-naive".to_owned())
            .spawn(runnable)
        {
            error!(target: "app::error", "failed to start a thread for the task: {}", err);
        }
    }

    fn new(_size: usize) -> Result<Self> {
        Ok(NaiveThreadPool)
    }
}
