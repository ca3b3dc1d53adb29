pub mod request_queue;
pub mod retry_policy;

pub use request_queue::{RequestQueue, SleepFn, tokio_sleep};
pub use retry_policy::RetryPolicy;
