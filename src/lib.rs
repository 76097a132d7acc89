//! Основной файл библиотеки shadow-sync
//!
//! Библиотека позволяет проигрывать видео по одному субтитру (или группе
//! субтитров) за раз с автоматической паузой на границе сегмента - для практики
//! "шадоуинга". Субтитры разбираются в упорядоченную шкалу сегментов, навигатор
//! выбирает окно воспроизведения, а планировщик ведет через это окно любой
//! медиаплеер, реализующий [`clock::MediaClock`].

pub mod clock;
pub mod config;
pub mod error;
pub mod logger;
pub mod navigator;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod subtitle;
pub mod translation;

pub use clock::{ClockEvent, ContentIdentity, MediaClock, PlayerState, SimulatedClock};
pub use config::{SchedulerTiming, ShadowSyncConfig};
pub use error::{Result, ShadowSyncError};
pub use navigator::{Navigator, PlaybackWindow};
pub use scheduler::{ActivationHandle, PlaybackScheduler, SchedulerState, WindowOutcome};
pub use session::ShadowingSession;
pub use subtitle::{parse_document, parse_timestamp, Segment, Timeline};
