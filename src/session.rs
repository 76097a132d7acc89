//! Сессия практики: навигатор, планировщик и статистика одного плеера
//!
//! Все состояние принадлежит экземпляру сессии, поэтому несколько плееров
//! могут работать независимо друг от друга.

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::clock::MediaClock;
use crate::config::ShadowSyncConfig;
use crate::error::{Result, ShadowSyncError};
use crate::navigator::{Navigator, PlaybackWindow};
use crate::scheduler::{ActivationHandle, PlaybackScheduler, SchedulerState};
use crate::stats::{StatEvent, StatsStore};
use crate::subtitle::{self, Timeline};
use crate::translation::{translate_or_placeholder, Translator};

/// Сессия практики "шадоуинга"
pub struct ShadowingSession {
    navigator: Navigator,
    scheduler: PlaybackScheduler,
    stats: Option<StatsStore>,
}

impl ShadowingSession {
    /// Создать сессию по конфигурации; статистика открывается, если задан `stats_path`
    pub fn new(clock: Arc<dyn MediaClock>, config: &ShadowSyncConfig) -> Result<Self> {
        config.validate()?;
        let stats = match &config.stats_path {
            Some(path) => Some(StatsStore::open(path)?),
            None => None,
        };
        Ok(Self {
            navigator: Navigator::new(config.group_size)?,
            scheduler: PlaybackScheduler::new(clock, config.scheduler.timing()),
            stats,
        })
    }

    /// Подключить хранилище статистики
    pub fn with_stats(mut self, stats: StatsStore) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Загрузить субтитры из текста; возвращает количество сегментов
    pub async fn load_timeline(&mut self, document: &str) -> Result<usize> {
        let timeline = subtitle::parse_document(document);
        self.install(timeline).await
    }

    /// Загрузить субтитры из файла
    pub async fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let timeline = subtitle::parse_file(path).await?;
        self.install(timeline).await
    }

    /// Загрузить уже разобранную шкалу
    pub async fn load_parsed(&mut self, timeline: Timeline) -> Result<usize> {
        self.install(timeline).await
    }

    async fn install(&mut self, timeline: Timeline) -> Result<usize> {
        let count = self.navigator.load(timeline)?;
        // Окно от прежней шкалы больше не имеет смысла
        if self.scheduler.generation() > 0 {
            self.scheduler.cancel().await;
        }
        info!("Session loaded {} segments", count);
        self.record(StatEvent::TimelineLoaded);
        Ok(count)
    }

    /// Проиграть текущее окно
    pub async fn play_current(&mut self) -> Result<ActivationHandle> {
        let window = self
            .navigator
            .current_window()
            .ok_or(ShadowSyncError::EmptyTimeline)?;
        Ok(self.scheduler.activate(&window).await)
    }

    /// Перейти к следующему окну и проиграть его
    pub async fn next(&mut self) -> Result<ActivationHandle> {
        self.navigator.next();
        self.record(StatEvent::Next);
        self.play_current().await
    }

    /// Перейти к предыдущему окну и проиграть его
    pub async fn previous(&mut self) -> Result<ActivationHandle> {
        self.navigator.previous();
        self.record(StatEvent::Previous);
        self.play_current().await
    }

    /// Повторить текущее окно
    pub async fn repeat(&mut self) -> Result<ActivationHandle> {
        self.navigator.repeat();
        self.record(StatEvent::Repeat);
        self.play_current().await
    }

    /// Изменить размер группы; действует со следующего окна
    pub fn set_group_size(&mut self, group_size: usize) -> Result<()> {
        self.navigator.set_group_size(group_size)
    }

    /// Отметить доигранное окно в статистике
    pub fn mark_completed(&mut self) {
        self.record(StatEvent::WindowCompleted);
    }

    /// Перевод текста текущего окна (или заглушка)
    pub async fn translate_current(
        &self,
        translator: &dyn Translator,
        target_lang: &str,
    ) -> Option<String> {
        let window = self.navigator.current_window()?;
        Some(translate_or_placeholder(translator, &window.text, target_lang).await)
    }

    pub fn current_window(&self) -> Option<PlaybackWindow> {
        self.navigator.current_window()
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    pub fn stats(&self) -> Option<&StatsStore> {
        self.stats.as_ref()
    }

    fn record(&mut self, event: StatEvent) {
        if let Some(stats) = &mut self.stats {
            if let Err(e) = stats.increment(event) {
                warn!("Failed to persist {} counter: {}", event.as_str(), e);
            }
        }
    }
}
