use loader_api::{Event, now_secs};

/// Поле, куда пишется время приёма события.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Обогатить событие: проставить `timestamp` (Unix секунды) на месте,
/// перезаписав прежнее значение, включая `null`.
///
/// Возвращает ту же ссылку, что получила.
pub fn transform(event: &mut Event) -> &mut Event {
    event.insert(TIMESTAMP_FIELD.to_string(), now_secs().into());
    event
}
