use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════
//  Event
// ════════════════════════════════════════════════════════════════

/// Событие: JSON-объект, декодированный из значения записи брокера.
///
/// Живёт один batch: создаётся при декодировании, один раз обогащается
/// timestamp'ом, уходит в index store и отбрасывается.
pub type Event = serde_json::Map<String, serde_json::Value>;

// ════════════════════════════════════════════════════════════════
//  Broker records
// ════════════════════════════════════════════════════════════════

/// Topic + partition, ключ для отслеживания offset'ов.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self { topic: topic.into(), partition }
    }
}

impl std::fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.topic, self.partition)
    }
}

/// Значение записи: распарсенный JSON или сырые байты, если парсинг не удался.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Json(serde_json::Value),
    Raw(Vec<u8>),
}

impl RecordValue {
    /// Декодировать payload: JSON если получится, иначе сырые байты.
    pub fn decode(bytes: &[u8]) -> Self {
        match serde_json::from_slice(bytes) {
            Ok(value) => RecordValue::Json(value),
            Err(_) => RecordValue::Raw(bytes.to_vec()),
        }
    }
}

impl std::fmt::Display for RecordValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordValue::Json(value) => write!(f, "{value}"),
            RecordValue::Raw(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
        }
    }
}

/// Одна запись, полученная от брокера за poll.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub topic: String,
    pub partition: i32,
    /// Монотонный в пределах partition.
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: RecordValue,
}

impl RawRecord {
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }

    /// Забрать значение как Event. `Err` возвращает запись обратно,
    /// если значение не JSON-объект.
    pub fn into_event(self) -> Result<Event, RawRecord> {
        match self.value {
            RecordValue::Json(serde_json::Value::Object(map)) => Ok(map),
            value => Err(RawRecord { value, ..self }),
        }
    }
}

/// Next offset to read per partition. Committed as-is after a batch.
pub type Watermarks = BTreeMap<TopicPartition, i64>;

// ════════════════════════════════════════════════════════════════
//  Bulk write
// ════════════════════════════════════════════════════════════════

/// Per-document result of one bulk call, in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkItemStatus(pub u16);

impl BulkItemStatus {
    pub const OK: BulkItemStatus = BulkItemStatus(200);
    pub const CREATED: BulkItemStatus = BulkItemStatus(201);

    /// Only 200 OK and 201 Created count as indexed.
    pub fn is_indexed(self) -> bool {
        self == Self::OK || self == Self::CREATED
    }
}
