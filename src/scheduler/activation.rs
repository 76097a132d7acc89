//! Одна активация окна: перемотка, запуск, ожидание конца окна, пауза.
//!
//! Каждая активация живет в собственной задаче tokio со своей подпиской на
//! события, таймерами и токеном отмены. Перед каждой командой плееру задача
//! проверяет, что ее поколение все еще текущее.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::clock::{ClockEvent, ContentIdentity, MediaClock, PlayerState};
use crate::config::SchedulerTiming;
use crate::error::{Result, ShadowSyncError};
use crate::navigator::PlaybackWindow;
use crate::scheduler::{SchedulerState, WindowOutcome};

/// Граница "никогда" для неограниченно долгих таймеров
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Почему активация остановилась раньше, чем дошла до паузы
enum Halt {
    Superseded,
    Failed(ShadowSyncError),
}

impl From<ShadowSyncError> for Halt {
    fn from(e: ShadowSyncError) -> Self {
        Halt::Failed(e)
    }
}

#[derive(Debug, Clone, Copy)]
enum StopReason {
    Timer,
    Poll,
    Ended,
}

/// Что мешает окну проигрываться
#[derive(Debug, Default)]
struct Interruption {
    foreign: bool,
    stalled: bool,
}

impl Interruption {
    fn active(&self) -> bool {
        self.foreign || self.stalled
    }

    fn observe(&mut self, event: &ClockEvent) {
        match event {
            ClockEvent::ContentChanged(ContentIdentity::Foreign(_)) => self.foreign = true,
            ClockEvent::ContentChanged(ContentIdentity::Primary) => self.foreign = false,
            ClockEvent::StateChanged(PlayerState::Paused | PlayerState::Buffering) => {
                self.stalled = true
            }
            ClockEvent::StateChanged(PlayerState::Playing) => self.stalled = false,
            ClockEvent::StateChanged(PlayerState::Ended) | ClockEvent::SeekCompleted { .. } => {}
        }
    }
}

pub(crate) struct Activation {
    pub(crate) generation: u64,
    pub(crate) window: PlaybackWindow,
    pub(crate) clock: Arc<dyn MediaClock>,
    pub(crate) timing: SchedulerTiming,
    pub(crate) current_generation: Arc<AtomicU64>,
    pub(crate) state: Arc<watch::Sender<SchedulerState>>,
    pub(crate) cancel: CancellationToken,
    /// Цель перемотки прежней активации, снятой до подтверждения
    pub(crate) superseded_seek: Option<f64>,
}

impl Activation {
    pub(crate) async fn run(
        self,
        events: broadcast::Receiver<ClockEvent>,
    ) -> Result<WindowOutcome> {
        match self.drive(events).await {
            Ok(outcome) => Ok(outcome),
            Err(Halt::Superseded) => {
                debug!("Window #{}: superseded", self.generation);
                Ok(WindowOutcome::Superseded)
            }
            Err(Halt::Failed(e)) => {
                error!("Window #{}: playback failed: {}", self.generation, e);
                self.set_state(SchedulerState::Idle);
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        mut events: broadcast::Receiver<ClockEvent>,
    ) -> std::result::Result<WindowOutcome, Halt> {
        let mut interruption = Interruption::default();

        self.set_state(SchedulerState::Seeking);
        info!(
            "Window #{}: seeking to {:.3}s, ends at {:.3}s",
            self.generation, self.window.start, self.window.end
        );
        self.command(self.clock.seek(self.window.start)).await?;
        self.await_seek(&mut events, &mut interruption).await?;

        self.command(self.clock.play()).await?;
        // Мы сами запустили воспроизведение; сохраняется только посторонний контент
        interruption.stalled = false;
        self.set_state(SchedulerState::Playing);

        let mut interruptions = 0u32;
        let mut deadline = if interruption.active() {
            interruptions += 1;
            self.set_state(SchedulerState::Interrupted);
            info!("Window #{}: foreign content at start", self.generation);
            None
        } else {
            Some(self.arm().await?)
        };

        let mut poll = tokio::time::interval(self.timing.poll_interval.max(Duration::from_millis(1)));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let threshold = self.window.end - self.timing.stop_tolerance.as_secs_f64();

        let reason = loop {
            let armed = deadline.is_some();
            let wake_at = deadline.unwrap_or_else(Instant::now);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Halt::Superseded),
                event = events.recv() => match event {
                    Ok(ClockEvent::StateChanged(PlayerState::Ended)) => break StopReason::Ended,
                    Ok(event) => {
                        let was_interrupted = interruption.active();
                        interruption.observe(&event);
                        if !was_interrupted && interruption.active() {
                            deadline = None;
                            interruptions += 1;
                            self.set_state(SchedulerState::Interrupted);
                            info!("Window #{}: interrupted by {:?}", self.generation, event);
                        } else if was_interrupted && !interruption.active() {
                            deadline = Some(self.arm().await?);
                            self.set_state(SchedulerState::Playing);
                            info!("Window #{}: resumed", self.generation);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Среди потерянных событий могло быть возобновление:
                        // взводим таймер заново, конец окна все равно сверяется с позицией
                        warn!(
                            "Window #{}: skipped {} clock events, re-arming from current position",
                            self.generation, skipped
                        );
                        let was_interrupted = interruption.active();
                        interruption = Interruption::default();
                        deadline = Some(self.arm().await?);
                        if was_interrupted {
                            self.set_state(SchedulerState::Playing);
                        }
                    }
                    Err(RecvError::Closed) => {
                        return Err(ShadowSyncError::MediaFault(
                            "clock event stream closed".to_string(),
                        )
                        .into());
                    }
                },
                _ = tokio::time::sleep_until(wake_at), if armed => {
                    let position = self.command(self.clock.current_time()).await?;
                    if position >= threshold {
                        break StopReason::Timer;
                    }
                    // Плеер отстал от таймера: пересчитываем остаток от текущей позиции
                    debug!(
                        "Window #{}: timer fired at {:.3}s, before {:.3}s; re-arming",
                        self.generation, position, self.window.end
                    );
                    deadline = Some(self.deadline_from(position));
                },
                _ = poll.tick(), if armed => {
                    let position = self.command(self.clock.current_time()).await?;
                    if position >= threshold {
                        break StopReason::Poll;
                    }
                },
            }
        };

        self.command(self.clock.pause()).await?;
        let paused_at = self.command(self.clock.current_time()).await?;
        self.set_state(SchedulerState::Settled);
        info!(
            "Window #{}: paused at {:.3}s ({:?})",
            self.generation, paused_at, reason
        );

        Ok(WindowOutcome::Completed {
            paused_at,
            interruptions,
        })
    }

    /// Дождаться завершения перемотки, либо выждать задержку для плееров без события
    async fn await_seek(
        &self,
        events: &mut broadcast::Receiver<ClockEvent>,
        interruption: &mut Interruption,
    ) -> std::result::Result<(), Halt> {
        if !self.clock.reports_seek_completion() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Halt::Superseded),
                _ = tokio::time::sleep(self.timing.seek_settle) => return Ok(()),
            }
        }

        let watchdog = tokio::time::sleep(self.timing.seek_watchdog);
        tokio::pin!(watchdog);
        let mut superseded = self.superseded_seek;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Halt::Superseded),
                event = events.recv() => match event {
                    Ok(ClockEvent::SeekCompleted { position }) => {
                        let distance = (position - self.window.start).abs();
                        let stale = superseded
                            .map(|previous| (position - previous).abs() < distance)
                            .unwrap_or(false);
                        if stale {
                            // Подтверждение перемотки снятой активации приходит не больше одного раза
                            superseded = None;
                            debug!(
                                "Window #{}: ignoring completion of superseded seek at {:.3}s",
                                self.generation, position
                            );
                        } else if distance <= self.timing.seek_match_window {
                            debug!("Window #{}: seek completed at {:.3}s", self.generation, position);
                            return Ok(());
                        } else {
                            debug!(
                                "Window #{}: ignoring seek completion at {:.3}s",
                                self.generation, position
                            );
                        }
                    }
                    Ok(event) => interruption.observe(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Window #{}: skipped {} clock events", self.generation, skipped);
                        *interruption = Interruption::default();
                        let position = self.command(self.clock.current_time()).await?;
                        if (position - self.window.start).abs() <= self.timing.seek_match_window {
                            debug!(
                                "Window #{}: clock is at {:.3}s, treating seek as completed",
                                self.generation, position
                            );
                            return Ok(());
                        }
                    }
                    Err(RecvError::Closed) => {
                        return Err(ShadowSyncError::MediaFault(
                            "clock event stream closed".to_string(),
                        )
                        .into());
                    }
                },
                _ = &mut watchdog => return Err(self.watchdog_timeout().into()),
            }
        }
    }

    /// Взвести обязательство остановиться, исходя из текущей позиции плеера
    async fn arm(&self) -> std::result::Result<Instant, Halt> {
        let position = self.command(self.clock.current_time()).await?;
        let deadline = self.deadline_from(position);
        debug!(
            "Window #{}: armed at {:.3}s, {:.3}s remaining",
            self.generation,
            position,
            (self.window.end - position).max(0.0)
        );
        Ok(deadline)
    }

    fn deadline_from(&self, position: f64) -> Instant {
        let remaining = (self.window.end - position).max(0.0);
        let delay = Duration::try_from_secs_f64(remaining)
            .unwrap_or(FAR_FUTURE)
            .min(FAR_FUTURE)
            .saturating_add(self.timing.safety_margin);
        let now = Instant::now();
        now.checked_add(delay).unwrap_or(now + FAR_FUTURE)
    }

    /// Выполнить команду плеера, если активация все еще текущая.
    ///
    /// Команда, не ответившая за `seek_watchdog`, дает `SchedulerTimeout`.
    async fn command<T>(
        &self,
        command: impl Future<Output = Result<T>>,
    ) -> std::result::Result<T, Halt> {
        if !self.is_current() || self.cancel.is_cancelled() {
            return Err(Halt::Superseded);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Halt::Superseded),
            result = tokio::time::timeout(self.timing.seek_watchdog, command) => match result {
                Ok(result) => result.map_err(|e| Halt::Failed(as_media_fault(e))),
                Err(_) => Err(Halt::Failed(self.watchdog_timeout())),
            },
        }
    }

    fn watchdog_timeout(&self) -> ShadowSyncError {
        let waited_ms = u64::try_from(self.timing.seek_watchdog.as_millis()).unwrap_or(u64::MAX);
        ShadowSyncError::SchedulerTimeout { waited_ms }
    }

    fn is_current(&self) -> bool {
        self.current_generation.load(Ordering::SeqCst) == self.generation
    }

    fn set_state(&self, state: SchedulerState) {
        if self.is_current() {
            let previous = self.state.send_replace(state);
            if previous != state {
                debug!(
                    "Window #{}: {:?} -> {:?}",
                    self.generation, previous, state
                );
            }
        }
    }
}

fn as_media_fault(e: ShadowSyncError) -> ShadowSyncError {
    match e {
        ShadowSyncError::MediaFault(_) => e,
        other => ShadowSyncError::MediaFault(other.to_string()),
    }
}
