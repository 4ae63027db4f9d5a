//! Background processing with job queue and progress tracking

mod broker;
mod fetch;
mod job_queue;
#[cfg(feature = "redis")]
mod redis_broker;
mod worker;

pub use broker::{ChannelBroker, JobBroker};
pub use fetch::FileFetcher;
pub use job_queue::{JobProgress, JobQueue, QueueStats};
#[cfg(feature = "redis")]
pub use redis_broker::RedisBroker;
pub use worker::SummaryWorker;
