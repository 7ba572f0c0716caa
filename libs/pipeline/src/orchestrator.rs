use loader_api::{Event, Metrics, Stage};

use crate::PipelineError;
use crate::sink::{BatchWriter, WriteOutcome};
use crate::timer::ScopedTimer;

/// Записать batch через writer и учесть результат в счётчиках.
///
/// Пустой batch: no-op. Собственных повторов нет: все повторы внутри writer'а.
/// Ошибка writer'а увеличивает `errors` и возвращается вызывающему,
/// это единственный сигнал «не коммитить». Нормальный возврат засчитывает
/// все отправленные события как processed, включая брошенные после
/// исчерпания попыток.
pub async fn process_events(
    writer: &dyn BatchWriter,
    events: Vec<Event>,
    metrics: &dyn Metrics,
) -> Result<WriteOutcome, PipelineError> {
    if events.is_empty() {
        return Ok(WriteOutcome::default());
    }

    let _timer = ScopedTimer::start(metrics, Stage::Batch);
    let count = events.len() as u64;
    match writer.write_batch(events).await {
        Ok(outcome) => {
            metrics.inc_processed(count);
            Ok(outcome)
        }
        Err(e) => {
            metrics.inc_errors();
            tracing::error!(error = %e, "bulk insert failed");
            Err(e)
        }
    }
}
