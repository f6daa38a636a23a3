//! Background workers: channel consumers, the retry controller, and the
//! scheduled-message promoter. Each runs as its own polling loop; all
//! cross-replica coordination happens through conditional updates on the
//! message store.

pub mod channel_worker;
pub mod retry;
pub mod scheduler;

pub use channel_worker::ChannelWorker;
pub use retry::{RetryController, RetrySettings};
pub use scheduler::{Scheduler, SchedulerSettings};
