//! Catalog lookups: search, stream URLs and lyrics.

use tokio::runtime::Runtime;

use super::{App, login_hint};
use crate::api::AudioQuality;
use crate::error::ResultExt;
use crate::model::Track;

/// Search the catalog
pub fn cmd_search(
    rt: &Runtime,
    app: &App,
    keywords: &str,
    limit: u32,
    offset: u32,
) -> anyhow::Result<()> {
    let tracks = rt
        .block_on(app.api.search(keywords, limit, offset))
        .with_context("searching the catalog")
        .map_err(login_hint)?;
    if tracks.is_empty() {
        println!("No results for \"{}\".", keywords);
        return Ok(());
    }

    for (i, track) in tracks.iter().enumerate() {
        println!("{:>3}. {}", offset as usize + i + 1, format_track(track));
    }
    Ok(())
}

/// Resolve a stream URL
pub fn cmd_url(
    rt: &Runtime,
    app: &App,
    id: u64,
    quality: Option<AudioQuality>,
) -> anyhow::Result<()> {
    let quality = quality.unwrap_or(app.config.player.audio_quality);
    let url = rt
        .block_on(app.api.song_url(id, quality))
        .with_context("resolving the stream URL")
        .map_err(login_hint)?;
    match url {
        Some(url) => println!("{}", url),
        None => {
            eprintln!("Track {} is not playable ({} quality).", id, quality.label());
            std::process::exit(1);
        }
    }
    Ok(())
}

/// Print a lyric
pub fn cmd_lyric(rt: &Runtime, app: &App, id: u64, translated: bool) -> anyhow::Result<()> {
    let lyric = rt
        .block_on(app.api.lyric(id))
        .with_context("fetching the lyric")
        .map_err(login_hint)?;
    if lyric.is_empty() {
        println!("No lyric for track {}.", id);
        return Ok(());
    }

    if let Some(lrc) = &lyric.lrc {
        println!("{}", lrc);
    }
    if translated {
        if let Some(tlyric) = &lyric.translated {
            println!();
            println!("{}", tlyric);
        }
    }
    Ok(())
}

/// One-line description of a track.
pub(crate) fn format_track(track: &Track) -> String {
    format!(
        "[{}] {} - {}",
        track.id,
        track.display_title(),
        track.display_artist()
    )
}
