use crate::error::IsRetryable;
use crate::service::retry_policy::RetryPolicy;
use backon::Retryable;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// How the queue waits between retries; handed to backon as its sleeper.
pub type SleepFn = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

pub fn tokio_sleep() -> SleepFn {
    Arc::new(|dur: Duration| tokio::time::sleep(dur).boxed())
}

/// Single choke point for outbound jobs.
///
/// Not a FIFO: concurrent `enqueue` calls run their jobs concurrently and
/// share nothing but the policy. Retries of one job are strictly sequential.
#[derive(Clone)]
pub struct RequestQueue {
    policy: RetryPolicy,
    sleep: SleepFn,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RequestQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleep: tokio_sleep(),
        }
    }

    pub fn with_sleeper(mut self, sleep: SleepFn) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `job`, replaying it whole while the policy asks for a retry.
    ///
    /// The job may be invoked up to `max_attempts` times, so it must tolerate replay.
    pub async fn enqueue<T, E, F, Fut>(&self, job: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: IsRetryable + Display,
    {
        let sleep = self.sleep.clone();
        let policy = &self.policy;
        let mut retries: u32 = 0;

        job.retry(policy.schedule())
            .sleep(move |dur: Duration| sleep(dur))
            .when(|e: &E| e.is_retryable())
            .adjust(|e: &E, next: Option<Duration>| {
                let delay = policy.adjust(&e.retry_class(), next);
                if delay.is_none() {
                    warn!(max_attempts = policy.max_attempts(), error = %e, "job failed, giving up");
                }
                delay
            })
            .notify(|e: &E, dur: Duration| {
                retries += 1;
                warn!(
                    retry = retries,
                    max_attempts = policy.max_attempts(),
                    delay_ms = dur.as_millis() as u64,
                    error = %e,
                    "job failed, retrying after backoff"
                );
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Barrier;

    /// Queue whose sleeps are recorded and return immediately.
    fn queue() -> (RequestQueue, Arc<Mutex<Vec<Duration>>>) {
        let slept = Arc::new(Mutex::new(Vec::new()));
        let log = slept.clone();
        let queue = RequestQueue::default().with_sleeper(Arc::new(move |dur: Duration| {
            log.lock().unwrap().push(dur);
            futures::future::ready(()).boxed()
        }));
        (queue, slept)
    }

    fn rate_limited() -> GenerationError {
        GenerationError::RateLimitExceeded {
            retry_after_secs: 0.0,
        }
    }

    #[tokio::test]
    async fn first_try_success_does_not_sleep() {
        let (queue, sleeper) = queue();
        let calls = AtomicU32::new(0);

        let result: Result<&str, GenerationError> = queue
            .enqueue(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("ok")
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rate_limited_job_is_retried_until_success() {
        for failures in 1..3u32 {
            let (queue, sleeper) = queue();
            let calls = AtomicU32::new(0);

            let result = queue
                .enqueue(|| async {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < failures {
                        Err(rate_limited())
                    } else {
                        Ok("done")
                    }
                })
                .await;

            assert_eq!(result.unwrap(), "done");
            assert_eq!(calls.load(Ordering::SeqCst), failures + 1);
            let slept = sleeper.lock().unwrap().clone();
            assert_eq!(slept.len(), failures as usize);
            for (attempt, delay) in slept.iter().enumerate() {
                let floor = 2f64.powi(attempt as i32);
                let secs = delay.as_secs_f64();
                assert!(secs >= floor - 1e-3 && secs < floor + 1.0, "got {secs}");
            }
        }
    }

    #[tokio::test]
    async fn persistent_rate_limit_stops_after_three_attempts() {
        let (queue, sleeper) = queue();
        let calls = AtomicU32::new(0);

        let result: Result<(), GenerationError> = queue
            .enqueue(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(rate_limited())
            })
            .await;

        assert_eq!(result.unwrap_err(), rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn other_errors_propagate_immediately() {
        let (queue, sleeper) = queue();
        let calls = AtomicU32::new(0);

        let result: Result<(), GenerationError> = queue
            .enqueue(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GenerationError::Api {
                    message: "boom".to_string(),
                })
            })
            .await;

        assert_eq!(
            result.unwrap_err(),
            GenerationError::Api {
                message: "boom".to_string()
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn independent_jobs_run_concurrently() {
        let (queue, _sleeper) = queue();
        let barrier = Barrier::new(2);
        // Each job waits for the other, so this only completes if they overlap.
        let both = async {
            tokio::join!(
                queue.enqueue(|| async {
                    barrier.wait().await;
                    Ok::<_, GenerationError>(1)
                }),
                queue.enqueue(|| async {
                    barrier.wait().await;
                    Ok::<_, GenerationError>(2)
                }),
            )
        };
        let (a, b) = tokio::time::timeout(Duration::from_secs(5), both)
            .await
            .expect("jobs were serialized");
        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
    }
}
