//! Модуль обработки ошибок библиотеки shadow-sync
//!
//! Этот модуль содержит типы ошибок, которые могут возникнуть при работе библиотеки.

use thiserror::Error;

/// Ошибки библиотеки shadow-sync
#[derive(Debug, Error)]
pub enum ShadowSyncError {
    /// Некорректная временная метка (локальная ошибка блока, блок пропускается)
    #[error("Malformed timestamp: {0}")]
    MalformedTimestamp(String),

    /// В документе не найдено ни одного пригодного субтитра
    #[error("No usable subtitles")]
    EmptyTimeline,

    /// Размер группы должен быть не меньше 1
    #[error("Invalid group size: {0}")]
    InvalidGroupSize(usize),

    /// Медиаплеер отклонил команду
    #[error("Media fault: {0}")]
    MediaFault(String),

    /// Плеер не подтвердил перемотку за отведенное время
    #[error("Scheduler timeout: no seek completion after {waited_ms} ms")]
    SchedulerTimeout {
        /// Сколько миллисекунд прошло до срабатывания сторожевого таймера
        waited_ms: u64,
    },

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Ошибка сервиса перевода
    #[error("Translation error: {0}")]
    Translation(String),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

impl ShadowSyncError {
    /// Ошибка, после которой планировщик возвращается в `Idle`
    pub fn is_playback_failure(&self) -> bool {
        matches!(self, Self::MediaFault(_) | Self::SchedulerTimeout { .. })
    }
}

impl From<&str> for ShadowSyncError {
    fn from(s: &str) -> Self {
        ShadowSyncError::Other(s.to_string())
    }
}

impl From<String> for ShadowSyncError {
    fn from(s: String) -> Self {
        ShadowSyncError::Other(s)
    }
}

/// Тип Result для библиотеки shadow-sync
pub type Result<T> = std::result::Result<T, ShadowSyncError>;
