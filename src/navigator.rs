//! Навигация по шкале сегментов
//!
//! Навигатор хранит загруженную шкалу, текущую позицию и размер группы
//! (сколько соседних сегментов проигрывается как одно окно). Выход за границы
//! не считается ошибкой: позиция насыщается до ближайшего допустимого индекса.

use std::ops::Range;

use serde::Serialize;

use crate::error::{Result, ShadowSyncError};
use crate::subtitle::Timeline;

/// Окно воспроизведения: непрерывный диапазон сегментов шкалы
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackWindow {
    /// Индексы сегментов `[first, last + 1)`
    pub range: Range<usize>,
    /// Начало первого сегмента, секунды
    pub start: f64,
    /// Конец последнего сегмента, секунды; всегда `>= start`
    pub end: f64,
    /// Текст всех сегментов окна через пробел
    pub text: String,
}

impl PlaybackWindow {
    /// Окно вокруг произвольного интервала, без привязки к шкале
    pub fn from_bounds(start: f64, end: f64) -> Self {
        Self {
            range: 0..0,
            start,
            end: end.max(start),
            text: String::new(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Состояние навигатора
#[derive(Debug, Clone)]
pub struct Navigator {
    timeline: Timeline,
    current_index: usize,
    group_size: usize,
}

impl Navigator {
    /// Создать навигатор без шкалы; `group_size == 0` недопустим
    pub fn new(group_size: usize) -> Result<Self> {
        if group_size == 0 {
            return Err(ShadowSyncError::InvalidGroupSize(group_size));
        }
        Ok(Self {
            timeline: Timeline::default(),
            current_index: 0,
            group_size,
        })
    }

    /// Загрузить новую шкалу и сбросить позицию на первый сегмент.
    ///
    /// Пустая шкала не загружается: возвращается `EmptyTimeline`, а прежнее
    /// состояние сохраняется.
    pub fn load(&mut self, timeline: Timeline) -> Result<usize> {
        if timeline.is_empty() {
            return Err(ShadowSyncError::EmptyTimeline);
        }
        self.timeline = timeline;
        self.current_index = 0;
        Ok(self.timeline.len())
    }

    /// Текущее окно; `None`, если шкала не загружена
    pub fn current_window(&self) -> Option<PlaybackWindow> {
        let len = self.timeline.len();
        if len == 0 {
            return None;
        }

        let first = self.current_index.min(len - 1);
        let end_index = first.saturating_add(self.group_size).min(len);
        let segments = &self.timeline.segments()[first..end_index];

        let start = segments.first()?.start();
        let end = segments.last()?.end().max(start);
        let text = segments
            .iter()
            .map(|s| s.text())
            .collect::<Vec<_>>()
            .join(" ");

        Some(PlaybackWindow {
            range: first..end_index,
            start,
            end,
            text,
        })
    }

    /// Сдвинуть позицию на `delta` с насыщением в `[0, len - 1]`
    pub fn advance(&mut self, delta: isize) {
        let len = self.timeline.len();
        if len == 0 {
            return;
        }
        let last = len - 1;
        let target = if delta >= 0 {
            self.current_index.saturating_add(delta.unsigned_abs())
        } else {
            self.current_index.saturating_sub(delta.unsigned_abs())
        };
        self.current_index = target.min(last);
    }

    /// Следующее окно
    pub fn next(&mut self) {
        self.advance(self.group_delta());
    }

    /// Предыдущее окно
    pub fn previous(&mut self) {
        self.advance(-self.group_delta());
    }

    /// Повтор текущего окна
    pub fn repeat(&mut self) {
        self.advance(0);
    }

    /// Изменить размер группы; позиция не меняется
    pub fn set_group_size(&mut self, group_size: usize) -> Result<()> {
        if group_size == 0 {
            return Err(ShadowSyncError::InvalidGroupSize(group_size));
        }
        self.group_size = group_size;
        Ok(())
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    fn group_delta(&self) -> isize {
        isize::try_from(self.group_size).unwrap_or(isize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::parse_document;

    fn timeline(n: usize) -> Timeline {
        let doc: String = (0..n)
            .map(|i| {
                format!(
                    "{}\n00:00:{:02},000 --> 00:00:{:02},500\nline {}\n\n",
                    i + 1,
                    i * 2,
                    i * 2 + 1,
                    i
                )
            })
            .collect();
        parse_document(&doc)
    }

    fn loaded(n: usize, group_size: usize) -> Navigator {
        let mut navigator = Navigator::new(group_size).unwrap();
        navigator.load(timeline(n)).unwrap();
        navigator
    }

    #[test]
    fn test_group_windows_clamp_at_end() {
        let mut navigator = loaded(5, 2);
        assert_eq!(navigator.current_window().unwrap().range, 0..2);

        navigator.advance(2);
        assert_eq!(navigator.current_window().unwrap().range, 2..4);

        navigator.advance(2);
        assert_eq!(navigator.current_window().unwrap().range, 4..5);

        navigator.advance(2);
        assert_eq!(navigator.current_window().unwrap().range, 4..5);
    }

    #[test]
    fn test_window_bounds_and_text() {
        let navigator = loaded(5, 2);
        let window = navigator.current_window().unwrap();
        assert_eq!(window.start, 0.0);
        assert_eq!(window.end, 3.5);
        assert_eq!(window.text, "line 0 line 1");
    }

    #[test]
    fn test_previous_saturates_at_first() {
        let mut navigator = loaded(5, 2);
        navigator.next();
        navigator.previous();
        navigator.previous();
        assert_eq!(navigator.current_index(), 0);
        assert_eq!(navigator.current_window().unwrap().range, 0..2);
    }

    #[test]
    fn test_repeat_keeps_position() {
        let mut navigator = loaded(5, 1);
        navigator.next();
        navigator.repeat();
        assert_eq!(navigator.current_index(), 1);
    }

    #[test]
    fn test_set_group_size_keeps_index() {
        let mut navigator = loaded(5, 1);
        navigator.next();
        navigator.set_group_size(3).unwrap();
        assert_eq!(navigator.current_index(), 1);
        assert_eq!(navigator.current_window().unwrap().range, 1..4);

        assert!(matches!(
            navigator.set_group_size(0),
            Err(ShadowSyncError::InvalidGroupSize(0))
        ));
        assert_eq!(navigator.group_size(), 3);
    }

    #[test]
    fn test_empty_navigator() {
        let mut navigator = Navigator::new(1).unwrap();
        assert!(navigator.current_window().is_none());
        navigator.next();
        assert_eq!(navigator.current_index(), 0);
        assert!(matches!(
            navigator.load(Timeline::default()),
            Err(ShadowSyncError::EmptyTimeline)
        ));
    }

    #[test]
    fn test_load_resets_index() {
        let mut navigator = loaded(5, 1);
        navigator.advance(3);
        navigator.load(timeline(2)).unwrap();
        assert_eq!(navigator.current_index(), 0);
    }

    #[test]
    fn test_out_of_order_segments_keep_window_invariant() {
        let doc = "00:00:10,000 --> 00:00:11,000\nlater\n\n00:00:01,000 --> 00:00:02,000\nearlier\n";
        let mut navigator = Navigator::new(2).unwrap();
        navigator.load(parse_document(doc)).unwrap();
        let window = navigator.current_window().unwrap();
        assert!(window.end >= window.start);
        assert_eq!(window.start, 10.0);
    }
}
