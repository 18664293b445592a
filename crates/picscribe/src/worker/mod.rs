pub mod counter;
pub mod job;
pub mod pool;
pub mod scanner;

pub use counter::Counter;
pub use job::{ImageTask, ProcessingResult, SkipReason, TaskResult};
pub use pool::WorkerPool;
pub use scanner::DirectoryScanner;
