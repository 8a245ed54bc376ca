pub use self::pool::ThreadPool;
pub use self::rayon::RayonThreadPool;
pub use self::shared_queue::SharedQueueThreadPool;
pub use self::trivial::NaiveThreadPool;

mod pool;
mod rayon;
mod shared_queue;
mod trivial;
