//! Модуль для парсинга субтитров
//!
//! Разбирает документ из блоков SRT/WebVTT в упорядоченную шкалу сегментов.
//! Парсер работает по принципу "best effort": поврежденные блоки пропускаются,
//! а пустой результат означает, что пригодных субтитров нет.

use std::path::Path;

use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use serde::Serialize;

use crate::error::{Result, ShadowSyncError};
use crate::subtitle::timestamp::parse_timestamp;

lazy_static! {
    /// Строка тайминга: две метки, соединенные стрелкой; настройки кью после
    /// второй метки игнорируются
    static ref TIMING_LINE: Regex =
        Regex::new(r"^\s*([0-9:.,]+)\s*(?:-->|–>|—>|->|→)\s*([0-9:.,]+)").unwrap();
    /// Разметка: HTML-подобные теги, блоки {...} и аннотации [...]
    static ref MARKUP: Regex = Regex::new(r"<[^>]*>|\{[^}]*\}|\[[^\]]*\]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Один субтитр: интервал времени и текст
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    start: f64,
    end: f64,
    text: String,
}

impl Segment {
    /// Начало в секундах
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Конец в секундах
    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Длительность в секундах
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Упорядоченная шкала сегментов в порядке их появления в документе
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Timeline {
    segments: Vec<Segment>,
}

impl Timeline {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }
}

/// Разобрать документ субтитров.
///
/// Никогда не возвращает ошибку: некорректные блоки пропускаются, а документ
/// без пригодных блоков дает пустую шкалу.
pub fn parse_document(raw: &str) -> Timeline {
    let normalized = raw
        .trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    let mut segments = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    let mut block_number = 0usize;

    for line in normalized.split('\n') {
        if line.trim().is_empty() {
            if !block.is_empty() {
                block_number += 1;
                push_block(&block, block_number, &mut segments);
                block.clear();
            }
        } else {
            block.push(line);
        }
    }

    // Обрабатываем последний блок, если он есть
    if !block.is_empty() {
        block_number += 1;
        push_block(&block, block_number, &mut segments);
    }

    debug!(
        "Parsed {} segments from {} blocks",
        segments.len(),
        block_number
    );
    Timeline { segments }
}

/// Разобрать документ; пустая шкала превращается в `EmptyTimeline`
pub fn load_document(raw: &str) -> Result<Timeline> {
    let timeline = parse_document(raw);
    if timeline.is_empty() {
        return Err(ShadowSyncError::EmptyTimeline);
    }
    info!("Loaded timeline with {} segments", timeline.len());
    Ok(timeline)
}

/// Прочитать и разобрать файл субтитров
pub async fn parse_file<P: AsRef<Path>>(path: P) -> Result<Timeline> {
    debug!("Reading subtitle file: {}", path.as_ref().display());
    let contents = tokio::fs::read_to_string(path.as_ref()).await?;
    Ok(parse_document(&contents))
}

fn push_block(lines: &[&str], block_number: usize, segments: &mut Vec<Segment>) {
    match parse_block(lines) {
        Ok(Some(segment)) => segments.push(segment),
        Ok(None) => debug!("Skipping block #{}: no timing line or no text", block_number),
        Err(e) => debug!("Skipping block #{}: {}", block_number, e),
    }
}

/// Разбор одного блока. `Ok(None)` - в блоке нет тайминга или текста.
fn parse_block(lines: &[&str]) -> Result<Option<Segment>> {
    // Ищем строку с временными метками; все, что выше нее (номер кью), отбрасываем
    let Some((timing_index, captures)) = lines
        .iter()
        .enumerate()
        .find_map(|(i, line)| TIMING_LINE.captures(line).map(|c| (i, c)))
    else {
        return Ok(None);
    };

    let start = parse_timestamp(&captures[1])?;
    let end = parse_timestamp(&captures[2])?;
    if end < start {
        return Err(ShadowSyncError::MalformedTimestamp(format!(
            "end {} is before start {}",
            &captures[2], &captures[1]
        )));
    }

    let text = clean_text(&lines[timing_index + 1..]);
    if text.is_empty() {
        return Ok(None);
    }

    Ok(Some(Segment { start, end, text }))
}

/// Склеить строки текста через пробел и убрать разметку
fn clean_text(lines: &[&str]) -> String {
    let joined = lines.join(" ");
    let stripped = MARKUP.replace_all(&joined, " ");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRT: &str = "1\n00:00:01,500 --> 00:00:03,000\nHello\n\n2\n00:00:03,500 --> 00:00:05,000\nSecond <i>line</i>\nwrapped\n";

    #[test]
    fn test_round_trip_single_block() {
        let timeline = parse_document("1\n00:00:01,500 --> 00:00:03,000\nHello\n");
        assert_eq!(timeline.len(), 1);
        let segment = timeline.get(0).unwrap();
        assert!((segment.start() - 1.5).abs() < 1e-9);
        assert!((segment.end() - 3.0).abs() < 1e-9);
        assert_eq!(segment.text(), "Hello");
    }

    #[test]
    fn test_multiline_and_markup() {
        let timeline = parse_document(SRT);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.segments()[1].text(), "Second line wrapped");
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_document("").is_empty());
        assert!(parse_document("\n\n  \n").is_empty());
        assert!(matches!(load_document(""), Err(ShadowSyncError::EmptyTimeline)));
    }

    #[test]
    fn test_malformed_blocks_are_skipped_in_order() {
        let doc = "\
1
00:00:01,000 --> 00:00:02,000
first

2
00:00:xx,000 --> 00:00:03,000
broken timestamp

3
00:00:05,000 --> 00:00:04,000
end before start

4
00:00:06,000 --> 00:00:07,000
second

just some text without timing

5
00:00:08,000 --> 00:00:09,000
[Music]

6
00:00:10,000 --> 00:00:11,000
third
";
        let timeline = parse_document(doc);
        let texts: Vec<&str> = timeline.iter().map(Segment::text).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_webvtt_with_header_and_settings() {
        let doc = "WEBVTT\nKind: captions\n\nNOTE a comment\n\n00:01.000 --> 00:02.500 align:start position:0%\n<c.yellow>Hi</c> {\\an8}there\n";
        let timeline = parse_document(doc);
        assert_eq!(timeline.len(), 1);
        let segment = timeline.get(0).unwrap();
        assert!((segment.start() - 1.0).abs() < 1e-9);
        assert!((segment.end() - 2.5).abs() < 1e-9);
        assert_eq!(segment.text(), "Hi there");
    }

    #[test]
    fn test_crlf_bom_and_alternate_arrows() {
        let doc = "\u{feff}1\r\n00:00:01.000 -> 00:00:02.000\r\nOne\r\n\r\n\r\n2\r00:00:03.000 → 00:00:04.000\rTwo\r";
        let texts: Vec<String> = parse_document(doc)
            .iter()
            .map(|s| s.text().to_string())
            .collect();
        assert_eq!(texts, vec!["One".to_string(), "Two".to_string()]);
    }

    #[test]
    fn test_zero_duration_is_kept() {
        let timeline = parse_document("00:00:02,000 --> 00:00:02,000\nblink\n");
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.get(0).unwrap().duration(), 0.0);
    }

    #[test]
    fn test_order_is_not_sorted() {
        let doc = "00:00:10,000 --> 00:00:11,000\nlater\n\n00:00:01,000 --> 00:00:02,000\nearlier\n";
        let timeline = parse_document(doc);
        let texts: Vec<&str> = timeline.iter().map(Segment::text).collect();
        assert_eq!(texts, vec!["later", "earlier"]);
    }

    #[tokio::test]
    async fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesson.srt");
        tokio::fs::write(&path, SRT).await.unwrap();

        let timeline = parse_file(&path).await.unwrap();
        assert_eq!(timeline.len(), 2);

        let missing = parse_file(dir.path().join("missing.srt")).await;
        assert!(matches!(missing, Err(ShadowSyncError::Io(_))));
    }
}
