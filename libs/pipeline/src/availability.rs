use std::future::Future;
use std::time::Duration;

use crate::PipelineError;

/// Политика проверки доступности перед стартом: N попыток с фиксированной паузой.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for AvailabilityPolicy {
    fn default() -> Self {
        Self { attempts: 10, delay: Duration::from_secs(3) }
    }
}

/// Вызывать `check` пока он не вернёт `Ok`, не больше `policy.attempts` раз.
/// Пауза только между попытками.
pub(crate) async fn wait_available<F, Fut, E>(
    service: &'static str,
    policy: AvailabilityPolicy,
    mut check: F,
) -> Result<(), PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    for attempt in 1..=policy.attempts {
        match check().await {
            Ok(()) => {
                tracing::info!(service, attempt, "{service} is available");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(service, attempt, error = %e, "waiting for {service}...");
            }
        }
        if attempt < policy.attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }
    Err(PipelineError::Unavailable { service, attempts: policy.attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn returns_on_first_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let started = tokio::time::Instant::now();
        let res = wait_available("Kafka", AvailabilityPolicy::default(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        })
        .await;
        assert!(res.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_fixed_delay() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let started = tokio::time::Instant::now();
        let res = wait_available("Kafka", AvailabilityPolicy::default(), move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 { Err("down") } else { Ok(()) }
        })
        .await;
        assert!(res.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let started = tokio::time::Instant::now();
        let res = wait_available("Elasticsearch", AvailabilityPolicy::default(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("down")
        })
        .await;
        assert!(matches!(
            res,
            Err(PipelineError::Unavailable { service: "Elasticsearch", attempts: 10 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(started.elapsed(), Duration::from_secs(27));
    }
}
