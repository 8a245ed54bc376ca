use crate::server_common::Result;

/// the `ThreadPool` backed by a `rayon` pool.
pub struct RayonThreadPool(rayon::ThreadPool);

impl super::ThreadPool for RayonThreadPool {
    fn spawn<R>(&self, runnable: R)
    where
        R: 'static + Send + FnOnce(),
    {
        self.0.spawn(runnable)
    }

    fn new(size: usize) -> Result<Self> {
        let inner = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("txseq-rayon-{}", i))
            .build()?;
        Ok(RayonThreadPool(inner))
    }
}
