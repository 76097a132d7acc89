//! Загрузка субтитров по сети
//!
//! Провайдер видео (или прокси перед ним) отдает текст субтитров,
//! который затем передается парсеру блоков без изменений.

use std::time::Duration;

use log::{debug, error};

use crate::error::Result;
use crate::subtitle::parser::{load_document, Timeline};

/// HTTP клиент для загрузки текстовых субтитров
#[derive(Debug, Clone)]
pub struct TimedTextClient {
    client: reqwest::Client,
}

impl TimedTextClient {
    /// Создать клиент с таймаутом запроса
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Использовать уже настроенный `reqwest::Client`
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Скачать документ субтитров как текст
    pub async fn fetch_document(&self, url: &str) -> Result<String> {
        debug!("Fetching subtitles from {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                error!("Subtitle request failed: {}", e);
                e
            })?;
        let body = response.text().await?;
        debug!("Fetched {} bytes of subtitles", body.len());
        Ok(body)
    }

    /// Скачать и разобрать документ; пустой результат дает `EmptyTimeline`
    pub async fn fetch_timeline(&self, url: &str) -> Result<Timeline> {
        let body = self.fetch_document(url).await?;
        load_document(&body)
    }
}
