//! Детерминированный медиаплеер в памяти процесса
//!
//! Позиция вычисляется по часам `tokio::time`, поэтому плеер корректно
//! работает и под `start_paused = true`. Все команды записываются, а события
//! (реклама, буферизация, ручная пауза, сбои) можно вызывать вручную.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::clock::{ClockEvent, ContentIdentity, MediaClock, PlayerState};
use crate::error::{Result, ShadowSyncError};

const EVENT_CAPACITY: usize = 64;

/// Команда плеера
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockCommand {
    Seek,
    Play,
    Pause,
    CurrentTime,
}

/// Записанный вызов команды
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub command: ClockCommand,
    /// Позиция плеера в момент вызова (для `Seek` - запрошенная позиция)
    pub position: f64,
}

/// Как плеер сообщает о перемотке
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeekReporting {
    Events,
    Silent,
    Lost,
}

#[derive(Debug)]
struct State {
    anchor_position: f64,
    anchor_instant: Instant,
    playing: bool,
    buffering: bool,
    foreign: bool,
    failures: HashSet<ClockCommand>,
    stalls: HashSet<ClockCommand>,
    calls: Vec<RecordedCall>,
}

impl State {
    fn running(&self) -> bool {
        self.playing && !self.buffering && !self.foreign
    }

    fn position(&self, duration: Option<f64>) -> f64 {
        let position = if self.running() {
            self.anchor_position + self.anchor_instant.elapsed().as_secs_f64()
        } else {
            self.anchor_position
        };
        match duration {
            Some(limit) => position.min(limit),
            None => position,
        }
    }

    /// Зафиксировать позицию перед сменой флагов
    fn freeze(&mut self, duration: Option<f64>) {
        self.anchor_position = self.position(duration);
        self.anchor_instant = Instant::now();
    }
}

/// Медиаплеер-симулятор
#[derive(Debug)]
pub struct SimulatedClock {
    state: Mutex<State>,
    events: broadcast::Sender<ClockEvent>,
    seek_latency: Duration,
    seek_offset: f64,
    seek_reporting: SeekReporting,
    duration: Option<f64>,
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedClock {
    /// Плеер на позиции 0, на паузе, с задержкой перемотки 50 мс
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(State {
                anchor_position: 0.0,
                anchor_instant: Instant::now(),
                playing: false,
                buffering: false,
                foreign: false,
                failures: HashSet::new(),
                stalls: HashSet::new(),
                calls: Vec::new(),
            }),
            events,
            seek_latency: Duration::from_millis(50),
            seek_offset: 0.0,
            seek_reporting: SeekReporting::Events,
            duration: None,
        }
    }

    /// Задержка между `seek` и событием `SeekCompleted`
    pub fn with_seek_latency(mut self, latency: Duration) -> Self {
        self.seek_latency = latency;
        self
    }

    /// Перемотка попадает не точно в цель, а со смещением (ключевые кадры)
    pub fn with_seek_offset(mut self, offset: f64) -> Self {
        self.seek_offset = offset;
        self
    }

    /// Плеер без события завершения перемотки
    pub fn without_seek_events(mut self) -> Self {
        self.seek_reporting = SeekReporting::Silent;
        self
    }

    /// Плеер обещает событие перемотки, но никогда его не присылает
    pub fn with_lost_seek_events(mut self) -> Self {
        self.seek_reporting = SeekReporting::Lost;
        self
    }

    /// Длительность медиа, дальше которой позиция не растет
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Текущая позиция без записи вызова
    pub fn position(&self) -> f64 {
        self.state.lock().position(self.duration)
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    /// Все записанные вызовы
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Записанные вызовы одной команды
    pub fn calls_of(&self, command: ClockCommand) -> Vec<RecordedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.command == command)
            .cloned()
            .collect()
    }

    pub fn count(&self, command: ClockCommand) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.command == command)
            .count()
    }

    /// Следующий вызов команды завершится ошибкой
    pub fn fail_next(&self, command: ClockCommand) {
        self.state.lock().failures.insert(command);
    }

    /// Следующий вызов команды никогда не завершится
    pub fn stall_next(&self, command: ClockCommand) {
        self.state.lock().stalls.insert(command);
    }

    /// Начался посторонний контент: позиция основного видео замирает
    pub fn start_foreign(&self, id: impl Into<String>) {
        let id = id.into();
        debug!("Simulated clock: foreign content {}", id);
        self.update(|state| state.foreign = true);
        self.emit(ClockEvent::ContentChanged(ContentIdentity::Foreign(id)));
    }

    /// Вернулось основное видео
    pub fn resume_primary(&self) {
        self.update(|state| state.foreign = false);
        self.emit(ClockEvent::ContentChanged(ContentIdentity::Primary));
    }

    /// Пользователь поставил паузу вручную
    pub fn external_pause(&self) {
        self.update(|state| state.playing = false);
        self.emit(ClockEvent::StateChanged(PlayerState::Paused));
    }

    /// Пользователь запустил воспроизведение вручную
    pub fn external_play(&self) {
        self.update(|state| state.playing = true);
        self.emit(ClockEvent::StateChanged(PlayerState::Playing));
    }

    pub fn start_buffering(&self) {
        self.update(|state| state.buffering = true);
        self.emit(ClockEvent::StateChanged(PlayerState::Buffering));
    }

    pub fn stop_buffering(&self) {
        self.update(|state| state.buffering = false);
        self.emit(ClockEvent::StateChanged(PlayerState::Playing));
    }

    /// Медиа закончилось
    pub fn end_of_media(&self) {
        let duration = self.duration;
        self.update(|state| {
            if let Some(limit) = duration {
                state.anchor_position = limit;
            }
            state.playing = false;
        });
        self.emit(ClockEvent::StateChanged(PlayerState::Ended));
    }

    fn update(&self, change: impl FnOnce(&mut State)) {
        let mut state = self.state.lock();
        state.freeze(self.duration);
        change(&mut state);
    }

    fn emit(&self, event: ClockEvent) {
        // Ошибка означает лишь отсутствие подписчиков
        if self.events.send(event).is_err() {
            debug!("Simulated clock: event dropped, no subscribers");
        }
    }

    /// Записать вызов; возвращает ошибку, если для команды назначен сбой
    fn record(&self, command: ClockCommand, position: Option<f64>) -> Result<()> {
        let mut state = self.state.lock();
        let position = position.unwrap_or_else(|| state.position(self.duration));
        state.calls.push(RecordedCall { command, position });
        if state.failures.remove(&command) {
            return Err(ShadowSyncError::MediaFault(format!(
                "simulated {:?} failure",
                command
            )));
        }
        Ok(())
    }

    async fn hold_if_stalled(&self, command: ClockCommand) {
        let stalled = self.state.lock().stalls.remove(&command);
        if stalled {
            debug!("Simulated clock: {:?} stalled", command);
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl MediaClock for SimulatedClock {
    async fn seek(&self, position: f64) -> Result<()> {
        self.record(ClockCommand::Seek, Some(position))?;
        self.hold_if_stalled(ClockCommand::Seek).await;
        let landed = (position + self.seek_offset).max(0.0);
        self.update(|state| state.anchor_position = landed);

        if self.seek_reporting == SeekReporting::Events {
            let events = self.events.clone();
            let latency = self.seek_latency;
            tokio::spawn(async move {
                tokio::time::sleep(latency).await;
                let _ = events.send(ClockEvent::SeekCompleted { position: landed });
            });
        }
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record(ClockCommand::Play, None)?;
        self.hold_if_stalled(ClockCommand::Play).await;
        self.update(|state| state.playing = true);
        self.emit(ClockEvent::StateChanged(PlayerState::Playing));
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(ClockCommand::Pause, None)?;
        self.hold_if_stalled(ClockCommand::Pause).await;
        self.update(|state| state.playing = false);
        self.emit(ClockEvent::StateChanged(PlayerState::Paused));
        Ok(())
    }

    async fn current_time(&self) -> Result<f64> {
        self.hold_if_stalled(ClockCommand::CurrentTime).await;
        let mut state = self.state.lock();
        if state.failures.remove(&ClockCommand::CurrentTime) {
            return Err(ShadowSyncError::MediaFault(
                "simulated CurrentTime failure".to_string(),
            ));
        }
        Ok(state.position(self.duration))
    }

    fn subscribe(&self) -> broadcast::Receiver<ClockEvent> {
        self.events.subscribe()
    }

    fn reports_seek_completion(&self) -> bool {
        self.seek_reporting != SeekReporting::Silent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_position_advances_only_while_playing() {
        let clock = SimulatedClock::new();
        clock.seek(10.0).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(clock.position(), 10.0);

        clock.play().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!((clock.position() - 11.5).abs() < 1e-6);

        clock.start_foreign("ad-1");
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!((clock.position() - 11.5).abs() < 1e-6);

        clock.resume_primary();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!((clock.position() - 12.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_emits_completion_after_latency() {
        let clock = SimulatedClock::new()
            .with_seek_latency(Duration::from_millis(200))
            .with_seek_offset(-0.25);
        let mut events = clock.subscribe();
        clock.seek(4.0).await.unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event, ClockEvent::SeekCompleted { position: 3.75 });
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let clock = SimulatedClock::new();
        clock.fail_next(ClockCommand::Play);
        assert!(matches!(clock.play().await, Err(ShadowSyncError::MediaFault(_))));
        assert!(clock.play().await.is_ok());
        assert_eq!(clock.count(ClockCommand::Play), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_next_is_one_shot() {
        let clock = SimulatedClock::new();
        clock.stall_next(ClockCommand::Pause);
        let stalled = tokio::time::timeout(Duration::from_secs(60), clock.pause()).await;
        assert!(stalled.is_err());
        assert!(clock.pause().await.is_ok());
        assert_eq!(clock.count(ClockCommand::Pause), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_caps_position() {
        let clock = SimulatedClock::new().with_duration(3.0);
        clock.play().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(clock.position(), 3.0);
    }

    #[test]
    fn test_seek_reporting_modes() {
        assert!(SimulatedClock::new().reports_seek_completion());
        assert!(SimulatedClock::new().with_lost_seek_events().reports_seek_completion());
        assert!(!SimulatedClock::new().without_seek_events().reports_seek_completion());
    }
}
