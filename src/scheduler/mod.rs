//! Планировщик воспроизведения
//!
//! Планировщик ведет медиаплеер через одно окно за раз: перематывает на начало
//! окна, запускает воспроизведение и ставит паузу на конце окна. Оставшаяся
//! длительность вычисляется по позиции, которую сообщает сам плеер в момент
//! запуска, а после прерывания (реклама, буферизация, ручная пауза)
//! обязательство остановиться взводится заново от текущей позиции.
//!
//! Каждая активация получает монотонно растущий номер поколения. Новая
//! активация отменяет предыдущую и дожидается ее завершения до того, как
//! отправить плееру первую команду, поэтому устаревший таймер не может
//! поставить на паузу чужое окно.

mod activation;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, error};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::MediaClock;
use crate::config::SchedulerTiming;
use crate::error::Result;
use crate::navigator::PlaybackWindow;

use activation::Activation;

/// Состояние планировщика
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    /// Нет активного окна (в том числе после сбоя)
    Idle,
    /// Ждем завершения перемотки на начало окна
    Seeking,
    /// Окно проигрывается, обязательство остановиться взведено
    Playing,
    /// Плеер не продвигает окно: реклама, буферизация или ручная пауза
    Interrupted,
    /// Окно доиграно, плеер на паузе
    Settled,
}

/// Чем закончилась активация окна
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WindowOutcome {
    /// Плеер поставлен на паузу на позиции `paused_at`
    Completed { paused_at: f64, interruptions: u32 },
    /// Активацию заменила более новая
    Superseded,
}

/// Результат одной активации; его можно дождаться через [`ActivationHandle::settled`]
#[derive(Debug)]
pub struct ActivationHandle {
    generation: u64,
    outcome: oneshot::Receiver<Result<WindowOutcome>>,
}

impl ActivationHandle {
    /// Номер поколения активации
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Дождаться конца окна.
    ///
    /// Сбои плеера (`MediaFault`) и сторожевой таймер (`SchedulerTimeout`)
    /// приходят сюда как ошибки; повтор - решение вызывающего кода.
    pub async fn settled(self) -> Result<WindowOutcome> {
        match self.outcome.await {
            Ok(result) => result,
            // Задача снята до того, как успела ответить
            Err(_) => Ok(WindowOutcome::Superseded),
        }
    }
}

struct ActiveTask {
    generation: u64,
    seek_target: f64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Планировщик воспроизведения для одного экземпляра плеера
pub struct PlaybackScheduler {
    clock: Arc<dyn MediaClock>,
    timing: SchedulerTiming,
    generation: Arc<AtomicU64>,
    state: Arc<watch::Sender<SchedulerState>>,
    active: Option<ActiveTask>,
}

impl PlaybackScheduler {
    pub fn new(clock: Arc<dyn MediaClock>, timing: SchedulerTiming) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            clock,
            timing,
            generation: Arc::new(AtomicU64::new(0)),
            state: Arc::new(state),
            active: None,
        }
    }

    /// Текущее состояние
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Подписка на смену состояний
    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Номер поколения последней активации (0 - активаций еще не было)
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn timing(&self) -> SchedulerTiming {
        self.timing
    }

    pub fn clock(&self) -> &Arc<dyn MediaClock> {
        &self.clock
    }

    /// Активировать окно: отменить предыдущую активацию и начать новую
    pub async fn activate(&mut self, window: &PlaybackWindow) -> ActivationHandle {
        let superseded_seek = self.abort_active().await;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        // Подписываемся до первой команды, чтобы не пропустить ни одного события
        let events = self.clock.subscribe();
        let activation = Activation {
            generation,
            window: window.clone(),
            clock: Arc::clone(&self.clock),
            timing: self.timing,
            current_generation: Arc::clone(&self.generation),
            state: Arc::clone(&self.state),
            cancel: cancel.clone(),
            superseded_seek,
        };

        let task = tokio::spawn(async move {
            let outcome = activation.run(events).await;
            if outcome_tx.send(outcome).is_err() {
                debug!("Window #{}: outcome dropped, handle released", generation);
            }
        });

        self.active = Some(ActiveTask {
            generation,
            seek_target: window.start,
            cancel,
            task,
        });

        ActivationHandle {
            generation,
            outcome: outcome_rx,
        }
    }

    /// Отменить текущую активацию без перезапуска
    pub async fn cancel(&mut self) {
        self.abort_active().await;
        self.state.send_replace(SchedulerState::Idle);
    }

    /// Снять текущую активацию. Возвращает цель ее перемотки, если та еще
    /// не была подтверждена плеером.
    async fn abort_active(&mut self) -> Option<f64> {
        let active = self.active.take()?;
        let seeking = self.state() == SchedulerState::Seeking;
        active.cancel.cancel();
        if let Err(e) = active.task.await {
            error!("Window #{}: activation task failed: {}", active.generation, e);
        }
        seeking.then_some(active.seek_target)
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            active.task.abort();
        }
    }
}
