use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::walker::HistoryWalker;
use crate::model::{Channel, Message};
use crate::pool::{WorkQueue, lock, shutdown_workers};
use crate::{AppError, Result};

/// Combined output of every channel walker.
#[derive(Debug, Default)]
pub struct Harvest {
    pub channels: usize,
    pub messages: Vec<Message>,
    /// Channels skipped after a terminal error when aborting is disabled.
    pub failed_channels: Vec<String>,
}

#[derive(Default)]
struct DispatchState {
    messages: Vec<Message>,
    failed: Vec<String>,
    failure: Option<AppError>,
}

/// Runs a [`HistoryWalker`] for every channel on a bounded worker group.
pub struct Dispatcher {
    walker: Arc<HistoryWalker>,
    workers: usize,
    abort_on_channel_error: bool,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        walker: HistoryWalker,
        workers: usize,
        abort_on_channel_error: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            walker: Arc::new(walker),
            workers: workers.max(1),
            abort_on_channel_error,
            cancel,
        }
    }

    pub async fn harvest(&self, channels: &[Channel]) -> Result<Harvest> {
        let queue: WorkQueue<Channel> = WorkQueue::bounded(self.workers);
        let state = Arc::new(Mutex::new(DispatchState::default()));

        let workers = {
            let walker = Arc::clone(&self.walker);
            let state = Arc::clone(&state);
            let cancel = self.cancel.clone();
            let abort = self.abort_on_channel_error;
            queue.spawn_workers(self.workers, move |channel: Channel| {
                let walker = Arc::clone(&walker);
                let state = Arc::clone(&state);
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return;
                    }
                    match walker.walk(&channel).await {
                        Ok(messages) => lock(&state).messages.extend(messages),
                        Err(AppError::Cancelled) => {}
                        Err(err) if abort => {
                            error!(channel = %channel.id, name = %channel.name, error = %err, "aborting harvest");
                            let mut state = lock(&state);
                            if state.failure.is_none() {
                                state.failure = Some(err);
                            }
                            cancel.cancel();
                        }
                        Err(err) => {
                            warn!(channel = %channel.id, name = %channel.name, error = %err, "skipping channel");
                            lock(&state).failed.push(channel.id.clone());
                        }
                    }
                }
            })
        };

        let total = channels.len();
        for (i, channel) in channels.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            info!("{}/{}: {} ({})", i + 1, total, channel.id, channel.name);
            queue.push(channel.clone()).await?;
        }
        queue.drained().await;
        shutdown_workers(workers).await?;

        let state = std::mem::take(&mut *lock(&state));
        if let Some(err) = state.failure {
            return Err(err);
        }
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok(Harvest {
            channels: total - state.failed.len(),
            messages: state.messages,
            failed_channels: state.failed,
        })
    }
}
