//! Счетчики практики, сохраняемые между сессиями
//!
//! Простой JSON файл со счетчиками по типу события. Счетчики только растут.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Событие, которое учитывается в статистике
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatEvent {
    TimelineLoaded,
    Next,
    Previous,
    Repeat,
    WindowCompleted,
}

impl StatEvent {
    /// Ключ счетчика в файле
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimelineLoaded => "timeline_loaded",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::Repeat => "repeat",
            Self::WindowCompleted => "window_completed",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StatsFile {
    counters: BTreeMap<String, u64>,
    updated_at: Option<DateTime<Utc>>,
}

/// Хранилище счетчиков
#[derive(Debug)]
pub struct StatsStore {
    path: PathBuf,
    data: StatsFile,
}

impl StatsStore {
    /// Открыть хранилище; отсутствующий файл означает нулевые счетчики
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            StatsFile::default()
        };
        debug!("Opened stats store at {}", path.display());
        Ok(Self { path, data })
    }

    /// Увеличить счетчик, сохранить файл и вернуть новое значение
    pub fn increment(&mut self, event: StatEvent) -> Result<u64> {
        let counter = self
            .data
            .counters
            .entry(event.as_str().to_string())
            .or_insert(0);
        *counter = counter.saturating_add(1);
        let value = *counter;
        self.data.updated_at = Some(Utc::now());
        self.save()?;
        Ok(value)
    }

    pub fn count(&self, event: StatEvent) -> u64 {
        self.data
            .counters
            .get(event.as_str())
            .copied()
            .unwrap_or(0)
    }

    /// Время последнего изменения
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.data.updated_at
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        // Пишем во временный файл рядом и переименовываем, чтобы не оставить обрывок
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.data)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
