//! Модуль конфигурации библиотеки shadow-sync
//!
//! Этот модуль содержит структуры для настройки навигации, планировщика
//! воспроизведения, сервиса перевода и счетчиков статистики.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShadowSyncError};

/// Настройки планировщика воспроизведения (в миллисекундах)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Запас, добавляемый к оставшейся длительности окна; не больше `stop_tolerance_ms`
    pub safety_margin_ms: u64,
    /// Допуск ε при проверке достижения конца окна
    pub stop_tolerance_ms: u64,
    /// Период опроса текущей позиции плеера
    pub poll_interval_ms: u64,
    /// Задержка после перемотки для плееров без события завершения перемотки
    pub seek_settle_ms: u64,
    /// Сторожевой таймер ожидания завершения перемотки
    pub seek_watchdog_ms: u64,
    /// Насколько позиция в событии перемотки может отличаться от запрошенной
    pub seek_match_window_secs: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            safety_margin_ms: 30,
            stop_tolerance_ms: 40,
            poll_interval_ms: 100,
            seek_settle_ms: 300,
            seek_watchdog_ms: 5000,
            seek_match_window_secs: 1.0,
        }
    }
}

impl SchedulerConfig {
    /// Преобразовать настройки в тайминги планировщика
    pub fn timing(&self) -> SchedulerTiming {
        SchedulerTiming {
            safety_margin: Duration::from_millis(self.safety_margin_ms),
            stop_tolerance: Duration::from_millis(self.stop_tolerance_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            seek_settle: Duration::from_millis(self.seek_settle_ms),
            seek_watchdog: Duration::from_millis(self.seek_watchdog_ms),
            seek_match_window: self.seek_match_window_secs,
        }
    }
}

/// Тайминги, с которыми работает планировщик
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerTiming {
    pub safety_margin: Duration,
    pub stop_tolerance: Duration,
    pub poll_interval: Duration,
    pub seek_settle: Duration,
    pub seek_watchdog: Duration,
    /// В секундах медиавремени
    pub seek_match_window: f64,
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        SchedulerConfig::default().timing()
    }
}

/// Настройки сервиса перевода
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TranslationConfig {
    /// Адрес сервиса перевода
    pub endpoint: String,
    /// Язык субтитров
    pub source_lang: String,
    /// Язык перевода по умолчанию
    pub target_lang: String,
    /// Таймаут запроса
    pub timeout_ms: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.mymemory.translated.net/get".to_string(),
            source_lang: "en".to_string(),
            target_lang: "fa".to_string(),
            timeout_ms: 5000,
        }
    }
}

/// Конфигурация библиотеки
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShadowSyncConfig {
    /// Сколько соседних сегментов проигрывается как одно окно
    pub group_size: usize,
    /// Настройки планировщика
    pub scheduler: SchedulerConfig,
    /// Настройки перевода
    pub translation: TranslationConfig,
    /// Файл для счетчиков статистики, `None` отключает статистику
    pub stats_path: Option<String>,
    /// Таймаут загрузки субтитров по сети
    pub fetch_timeout_ms: u64,
}

impl Default for ShadowSyncConfig {
    fn default() -> Self {
        Self {
            group_size: 1,
            scheduler: SchedulerConfig::default(),
            translation: TranslationConfig::default(),
            stats_path: None,
            fetch_timeout_ms: 10_000,
        }
    }
}

impl ShadowSyncConfig {
    /// Загрузить конфигурацию из JSON файла и проверить ее
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        log::debug!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Проверить согласованность настроек
    pub fn validate(&self) -> Result<()> {
        if self.group_size == 0 {
            return Err(ShadowSyncError::InvalidGroupSize(0));
        }
        if self.scheduler.poll_interval_ms == 0 {
            return Err(ShadowSyncError::Configuration(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.scheduler.safety_margin_ms > self.scheduler.stop_tolerance_ms {
            return Err(ShadowSyncError::Configuration(format!(
                "safety_margin_ms ({}) must not exceed stop_tolerance_ms ({})",
                self.scheduler.safety_margin_ms, self.scheduler.stop_tolerance_ms
            )));
        }
        if self.scheduler.seek_watchdog_ms == 0 {
            return Err(ShadowSyncError::Configuration(
                "seek_watchdog_ms must be greater than zero".to_string(),
            ));
        }
        let window = self.scheduler.seek_match_window_secs;
        if !window.is_finite() || window < 0.0 {
            return Err(ShadowSyncError::Configuration(format!(
                "seek_match_window_secs must be a non-negative number, got {}",
                window
            )));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
