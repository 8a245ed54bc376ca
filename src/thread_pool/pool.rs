use crate::server_common::Result;

/// Runs the handlers of accepted connections.
pub trait ThreadPool: Sized {
    /// queue `runnable` to run on some thread of this pool.
    /// A panicking task must not take the pool down with it.
    fn spawn<R>(&self, runnable: R)
    where
        R: 'static + Send + FnOnce();

    /// a pool of `size` threads; pools that don't keep threads ignore it.
    fn new(size: usize) -> Result<Self>;
}
