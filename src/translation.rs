//! Перевод текста текущего окна
//!
//! Перевод - внешний сервис. Любая ошибка превращается в фиксированную
//! заглушку, повторных попыток нет.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;

use crate::config::TranslationConfig;
use crate::error::{Result, ShadowSyncError};

/// Текст, который показывается, если перевод получить не удалось
pub const TRANSLATION_UNAVAILABLE: &str = "Translation unavailable";

/// Сервис перевода
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String>;
}

/// Перевести текст или вернуть заглушку
pub async fn translate_or_placeholder(
    translator: &dyn Translator,
    text: &str,
    target_lang: &str,
) -> String {
    match translator.translate(text, target_lang).await {
        Ok(translated) if !translated.trim().is_empty() => translated,
        Ok(_) => {
            warn!("Translation service returned an empty result");
            TRANSLATION_UNAVAILABLE.to_string()
        }
        Err(e) => {
            warn!("Translation failed: {}", e);
            TRANSLATION_UNAVAILABLE.to_string()
        }
    }
}

// Ответ сервиса в формате MyMemory
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslationResponse {
    response_data: Option<ResponseData>,
    response_status: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseData {
    translated_text: String,
}

/// HTTP переводчик: `GET {endpoint}?q=...&langpair=src|dst`
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    client: reqwest::Client,
    endpoint: String,
    source_lang: String,
}

impl HttpTranslator {
    pub fn new(config: &TranslationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            source_lang: config.source_lang.clone(),
        })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String> {
        let langpair = format!("{}|{}", self.source_lang, target_lang);
        debug!("Translating {} chars ({})", text.len(), langpair);

        let body = self
            .client
            .get(&self.endpoint)
            .query(&[("q", text), ("langpair", langpair.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_response(&body)
    }
}

fn parse_response(body: &str) -> Result<String> {
    let response: TranslationResponse = serde_json::from_str(body)?;
    if let Some(status) = &response.response_status {
        let ok = status.as_u64() == Some(200) || status.as_str() == Some("200");
        if !ok {
            return Err(ShadowSyncError::Translation(format!(
                "service responded with status {}",
                status
            )));
        }
    }
    response
        .response_data
        .map(|data| data.translated_text)
        .ok_or_else(|| ShadowSyncError::Translation("missing responseData".to_string()))
}
