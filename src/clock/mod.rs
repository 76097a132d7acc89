//! Абстракция медиаплеера ("медиачасы")
//!
//! Любой плеер, умеющий перематывать, запускать и останавливать воспроизведение,
//! сообщать текущую позицию и рассылать события, подходит планировщику.
//! Решение о том, когда считать контент посторонним (например, реклама),
//! принимает адаптер конкретного плеера.

pub mod simulated;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;

pub use simulated::{ClockCommand, SimulatedClock};

/// Состояние воспроизведения, о котором сообщает плеер
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    Playing,
    Paused,
    Buffering,
    Ended,
}

/// Что сейчас показывает плеер
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentIdentity {
    /// Основное видео, к которому относятся субтитры
    Primary,
    /// Посторонний контент (реклама, другой ролик) с его идентификатором
    Foreign(String),
}

/// События медиаплеера
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClockEvent {
    /// Перемотка завершена, плеер стоит на `position`
    SeekCompleted { position: f64 },
    /// Состояние воспроизведения изменилось
    StateChanged(PlayerState),
    /// Сменился проигрываемый контент
    ContentChanged(ContentIdentity),
}

/// Возможности медиаплеера, которыми пользуется планировщик
#[async_trait]
pub trait MediaClock: Send + Sync {
    /// Перемотать на позицию в секундах
    async fn seek(&self, position: f64) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Текущая позиция в секундах
    async fn current_time(&self) -> Result<f64>;

    /// Подписаться на события плеера
    fn subscribe(&self) -> broadcast::Receiver<ClockEvent>;

    /// Сообщает ли плеер о завершении перемотки событием `SeekCompleted`.
    ///
    /// Если нет, планировщик выжидает фиксированную задержку после `seek`.
    fn reports_seek_completion(&self) -> bool {
        true
    }
}
