/// Класс ошибки коннектора. По нему source consumer решает, переживать
/// сбой poll'а или останавливать run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Клиент не создан или не подписан: настройки неверны.
    Config,
    /// Сетевой или временный сбой брокера/store, проходит сам.
    Io,
    /// Ответ или payload не разбирается.
    Format,
    /// Клиент в состоянии, из которого не выйти без переподключения.
    Fatal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Format => "format",
            ErrorKind::Fatal => "fatal",
        })
    }
}

/// Ошибка на границе broker/index store.
#[derive(Clone)]
pub struct ConnectorError {
    kind: ErrorKind,
    message: String,
}

impl ConnectorError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn format_err(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Fatal, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Повтор той же операции имеет смысл.
    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Io
    }
}

impl std::fmt::Debug for ConnectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ConnectorError {}

// NDJSON rendering in the store adapter relies on `?` here.
impl From<serde_json::Error> for ConnectorError {
    fn from(e: serde_json::Error) -> Self {
        Self::format_err(e.to_string())
    }
}
