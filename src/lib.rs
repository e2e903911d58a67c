use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;

pub mod api;
mod cli;
pub mod commands;
pub mod error;
pub mod harvest;
pub mod model;
pub mod pool;
pub mod presenter;
pub mod ranking;
pub mod retry;
pub mod settings;
pub mod slack;
pub mod window;

pub use cli::{Cli, Commands};
pub use error::{AppError, Result};

use api::ChatApi;
use harvest::{Dispatcher, HistoryWalker};
use model::{Channel, Ranking};
use ranking::{FunnyReactions, RankingAggregator, rank_messages};
use retry::RetryPolicy;
use settings::Settings;
use window::Window;

/// Calendar year of `now` as seen in `tz`.
pub fn year_at(now: DateTime<Utc>, tz: Tz) -> i32 {
    now.with_timezone(&tz).year()
}

pub fn default_year(tz: Tz) -> i32 {
    year_at(Utc::now(), tz)
}

/// Harvest every channel inside `window`, then rank what was found.
///
/// The two stages run strictly one after the other: ranking starts only
/// once every channel walker has finished.
pub async fn compute_ranking(
    api: Arc<dyn ChatApi>,
    window: Window,
    channels: &[Channel],
    settings: &Settings,
    cancel: CancellationToken,
) -> Result<Ranking> {
    let harvest = settings.harvest.clamped();

    let walker = HistoryWalker::new(
        api,
        window,
        harvest.history_page_size,
        harvest.parallel_histories,
        RetryPolicy::from(&settings.retry),
        cancel.clone(),
    );
    let dispatcher = Dispatcher::new(
        walker,
        harvest.parallel_channels,
        harvest.abort_on_channel_error,
        cancel,
    );
    let harvested = dispatcher.harvest(channels).await?;

    let aggregator = Arc::new(RankingAggregator::new(
        window,
        FunnyReactions::new(settings.award.funny_reactions.iter().cloned()),
    ));
    let mut ranking =
        rank_messages(harvested.messages, aggregator, harvest.parallel_ranking).await?;
    ranking.stats.channels = harvested.channels;
    Ok(ranking)
}
