use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::ChatApi;
use crate::error::{AppError, Result};
use crate::presenter::{Presenter, Target};
use crate::settings::Settings;
use crate::slack::SlackChatApi;
use crate::window::{Window, parse_time_zone};
use crate::{compute_ranking, default_year};

/// How `award` hands over its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Post,
    DryRun,
    Json,
}

fn resolve_window(settings: &Settings, year: Option<i32>) -> Result<(i32, Window)> {
    let tz = parse_time_zone(&settings.award.time_zone)?;
    let year = year
        .or(settings.award.year)
        .unwrap_or_else(|| default_year(tz));
    Ok((year, Window::for_year(year, tz)?))
}

fn resolve_target(
    settings: &Settings,
    post_channel: Option<String>,
    output: Output,
) -> Result<Target> {
    if output != Output::Post {
        return Ok(Target::Stdout);
    }
    post_channel
        .or_else(|| settings.slack.post_channel.clone())
        .filter(|c| !c.is_empty())
        .map(|channel_id| Target::Slack { channel_id })
        .ok_or(AppError::MissingPostChannel)
}

pub async fn run_award(
    config: &str,
    year: Option<i32>,
    post_channel: Option<String>,
    output: Output,
) -> Result<()> {
    let started = Instant::now();
    let settings = Settings::load_from(Path::new(config))?;
    let (year, window) = resolve_window(&settings, year)?;
    let target = resolve_target(&settings, post_channel, output)?;
    let token = settings.token()?;

    let api = Arc::new(SlackChatApi::connect(&token).await?);
    let channels = api.list_channels().await?;
    info!(
        year,
        oldest = window.oldest,
        latest = window.latest,
        channels = channels.len(),
        "harvesting reactions"
    );

    let ranking = compute_ranking(
        Arc::clone(&api) as Arc<dyn ChatApi>,
        window,
        &channels,
        &settings,
        CancellationToken::new(),
    )
    .await?;

    if output == Output::Json {
        let json = serde_json::to_string_pretty(&ranking)
            .map_err(|e| AppError::JsonSerialize(e.to_string()))?;
        println!("{}", json);
    } else {
        Presenter::new(
            api.as_ref(),
            target,
            settings.award.podium_size,
            settings.award.top_reactions,
        )
        .present(&ranking)
        .await?;
    }

    info!(elapsed = ?started.elapsed(), "award finished");
    Ok(())
}

pub async fn run_channels(config: &str) -> Result<()> {
    let settings = Settings::load_from(Path::new(config))?;
    let token = settings.token()?;

    let api = SlackChatApi::connect(&token).await?;
    let channels = api.list_channels().await?;

    for channel in &channels {
        println!("{}\t{}", channel.id, channel.name);
    }
    println!("{} channels", channels.len());
    Ok(())
}

pub fn run_window(config: &str, year: Option<i32>) -> Result<()> {
    let settings = Settings::load_from(Path::new(config))?;
    let (year, window) = resolve_window(&settings, year)?;

    println!(
        "{} ({}): oldest={} latest={}",
        year, settings.award.time_zone, window.oldest, window.latest
    );
    Ok(())
}
