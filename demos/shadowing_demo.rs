//! Пример сессии "шадоуинга" на симулированном плеере
//!
//! Запуск: `cargo run --example shadowing_demo [файл.srt|файл.vtt|http://...]`

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use shadow_sync::logger::init_logger;
use shadow_sync::subtitle::fetch::TimedTextClient;
use shadow_sync::{
    MediaClock, ShadowSyncConfig, ShadowingSession, SimulatedClock, WindowOutcome,
};

const BUILTIN: &str = "1
00:00:00,500 --> 00:00:02,000
Good morning!

2
00:00:02,400 --> 00:00:04,100
Could I get a <b>large</b> coffee, please?

3
00:00:04,600 --> 00:00:06,000
Sure, anything else?
";

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();

    let config = ShadowSyncConfig::default();
    let clock = Arc::new(SimulatedClock::new().with_seek_latency(Duration::from_millis(80)));
    let dyn_clock: Arc<dyn MediaClock> = clock.clone();
    let mut session = ShadowingSession::new(dyn_clock, &config)?;

    let count = match std::env::args().nth(1) {
        Some(source) if source.starts_with("http://") || source.starts_with("https://") => {
            let client = TimedTextClient::new(config.fetch_timeout())?;
            let timeline = client
                .fetch_timeline(&source)
                .await
                .with_context(|| format!("Failed to fetch subtitles from {}", source))?;
            session.load_parsed(timeline).await?
        }
        Some(path) => session
            .load_file(&path)
            .await
            .with_context(|| format!("Failed to load subtitles from {}", path))?,
        None => session.load_timeline(BUILTIN).await?,
    };
    println!("Loaded {} segments", count);

    for step in 0..count.min(5) {
        let handle = if step == 0 {
            session.play_current().await?
        } else {
            session.next().await?
        };
        if let Some(window) = session.current_window() {
            println!(
                "[{:>7.3} - {:>7.3}] {}",
                window.start, window.end, window.text
            );
        }
        match handle.settled().await? {
            WindowOutcome::Completed {
                paused_at,
                interruptions,
            } => {
                session.mark_completed();
                println!(
                    "    paused at {:.3}s, interruptions: {}",
                    paused_at, interruptions
                );
            }
            WindowOutcome::Superseded => println!("    superseded"),
        }
    }

    Ok(())
}
