use std::time::Instant;

use loader_api::{Metrics, Stage};

/// Замер длительности этапа. Длительность пишется в `Drop`, то есть
/// ровно один раз на любом пути выхода: `Ok`, `Err`, `?` или отмена future.
pub struct ScopedTimer<'a> {
    metrics: &'a dyn Metrics,
    stage: Stage,
    started: Instant,
}

impl<'a> ScopedTimer<'a> {
    pub fn start(metrics: &'a dyn Metrics, stage: Stage) -> Self {
        Self { metrics, stage, started: Instant::now() }
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        self.metrics.observe(self.stage, self.started.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingMetrics;

    #[test]
    fn records_once_on_success() {
        let metrics = RecordingMetrics::default();
        {
            let _t = ScopedTimer::start(&metrics, Stage::Transform);
        }
        assert_eq!(metrics.observations(Stage::Transform), 1);
        assert_eq!(metrics.observations(Stage::Batch), 0);
    }

    #[test]
    fn records_once_on_error_path() {
        fn failing(metrics: &dyn Metrics) -> Result<(), String> {
            let _t = ScopedTimer::start(metrics, Stage::SinkWrite);
            let write: Result<(), String> = Err("boom".into());
            write?;
            Ok(())
        }

        let metrics = RecordingMetrics::default();
        assert!(failing(&metrics).is_err());
        assert_eq!(metrics.observations(Stage::SinkWrite), 1);
    }

    #[tokio::test]
    async fn records_once_when_future_is_dropped() {
        let metrics = RecordingMetrics::default();
        let fut = async {
            let _t = ScopedTimer::start(&metrics, Stage::Consume);
            std::future::pending::<()>().await;
        };
        let res = tokio::time::timeout(std::time::Duration::from_millis(5), fut).await;
        assert!(res.is_err());
        assert_eq!(metrics.observations(Stage::Consume), 1);
    }
}
