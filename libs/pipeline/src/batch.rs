use loader_api::{Event, RawRecord, Watermarks};

use crate::transform::transform;

/// Накопитель одного poll-цикла: события для записи и watermark'и
/// partition'ов. Создаётся заново на каждый цикл и выбрасывается после commit.
#[derive(Debug, Default)]
pub struct Batch {
    events: Vec<Event>,
    watermarks: Watermarks,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Принять запись: JSON-объект трансформируется и попадает в batch,
    /// watermark partition'а сдвигается на offset + 1. Остальное
    /// возвращается в `Err` без изменения состояния.
    pub fn push(&mut self, record: RawRecord) -> Result<(), RawRecord> {
        let tp = record.topic_partition();
        let offset = record.offset;
        let mut event = record.into_event()?;
        transform(&mut event);
        self.events.push(event);

        let next = offset + 1;
        self.watermarks
            .entry(tp)
            .and_modify(|w| *w = (*w).max(next))
            .or_insert(next);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn watermarks(&self) -> &Watermarks {
        &self.watermarks
    }

    pub fn into_parts(self) -> (Vec<Event>, Watermarks) {
        (self.events, self.watermarks)
    }
}
