//! Headless playback, queue and history commands.
//!
//! These drive a [`PlaybackEngine`] over [`HeadlessMedia`], so state
//! changes are persisted exactly as an interactive player would.

use std::sync::Arc;

use chrono::{Local, TimeZone};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

use super::{App, login_hint};
use super::catalog::format_track;
use crate::error::ResultExt;
use crate::player::{HeadlessMedia, MediaEvent, PlayMode, PlaybackEngine};

type Engine = (
    PlaybackEngine,
    Arc<HeadlessMedia>,
    mpsc::UnboundedReceiver<MediaEvent>,
);

fn open_engine(app: &App) -> Engine {
    let (media, events) = HeadlessMedia::new();
    let media = Arc::new(media);
    let engine = PlaybackEngine::new(app.api.clone(), media.clone(), app.store.clone())
        .with_quality(app.config.player.audio_quality);
    engine.restore();
    (engine, media, events)
}

/// Feed queued media events back into the engine.
async fn pump_events(
    engine: &PlaybackEngine,
    events: &mut mpsc::UnboundedReceiver<MediaEvent>,
) -> anyhow::Result<()> {
    while let Ok(event) = events.try_recv() {
        engine.handle_media_event(event).await?;
    }
    Ok(())
}

/// Queue search results and start the first playable one
pub fn cmd_play(rt: &Runtime, app: &App, keywords: &str, limit: u32) -> anyhow::Result<()> {
    rt.block_on(async {
        let tracks = app
            .api
            .search(keywords, limit, 0)
            .await
            .with_context("searching the catalog")
            .map_err(login_hint)?;
        if tracks.is_empty() {
            println!("No results for \"{}\".", keywords);
            return Ok(());
        }

        let (engine, media, mut events) = open_engine(app);
        engine.set_playlist(tracks, 0).await?;
        pump_events(&engine, &mut events).await?;

        if let Some(track) = engine.current_track() {
            let label = if media.is_playing() { "Now playing" } else { "Loaded" };
            println!("{}: {}", label, format_track(&track));
            if let Some(url) = media.source() {
                println!("  Source: {}", url);
            }
            if let Some(lrc) = track.lyric.as_ref().and_then(|l| l.lrc.as_deref()) {
                let first = lrc.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
                println!("  Lyric:  {}", first);
            }
        }
        println!(
            "Queued {} tracks. Volume: {:.0}%{}",
            engine.tracks().len(),
            media.volume() * 100.0,
            if media.is_muted() { " (muted)" } else { "" }
        );

        engine.persist()?;
        engine.shutdown();
        Ok(())
    })
}

/// Show the persisted queue
pub fn cmd_queue(app: &App) -> anyhow::Result<()> {
    let (engine, _media, _events) = open_engine(app);

    let tracks = engine.tracks();
    if tracks.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    let current = engine.current_index();
    for (i, track) in tracks.iter().enumerate() {
        let marker = if i == current { "▶" } else { " " };
        println!("{} {:>3}. {}", marker, i + 1, format_track(track));
    }
    println!();
    let playback = engine.playback();
    println!(
        "Mode: {}  Volume: {:.0}%{}",
        engine.play_mode().label(),
        playback.volume * 100.0,
        if playback.muted { " (muted)" } else { "" }
    );
    Ok(())
}

/// Show, set or cycle the play mode
pub fn cmd_mode(app: &App, mode: Option<PlayMode>) -> anyhow::Result<()> {
    let (engine, _media, _events) = open_engine(app);

    let mode = match mode {
        Some(mode) => {
            engine.set_play_mode(mode);
            mode
        }
        None => engine.cycle_play_mode(),
    };
    engine.persist()?;
    println!("Play mode: {}", mode.label());
    Ok(())
}

/// Show or clear the play history
pub fn cmd_history(app: &App, limit: usize, clear: bool) -> anyhow::Result<()> {
    let (engine, _media, _events) = open_engine(app);

    if clear {
        engine.clear_history();
        engine.persist()?;
        println!("History cleared.");
        return Ok(());
    }

    let entries = engine.recent_history(limit);
    if entries.is_empty() {
        println!("No play history.");
        return Ok(());
    }

    for entry in entries {
        let played = Local
            .timestamp_millis_opt(entry.played_at)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("{}  {}", played, format_track(&entry.track));
    }
    Ok(())
}
