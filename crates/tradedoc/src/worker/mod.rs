pub mod job;
pub mod pool;

pub use job::{Job, JobResult};
pub use pool::WorkerPool;

// Re-export crossbeam_channel for callers that select over results
pub use crossbeam_channel;
