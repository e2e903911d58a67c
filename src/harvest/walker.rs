use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::{ChatApi, PageRequest};
use crate::error::FetchError;
use crate::model::{Channel, Message};
use crate::pool::{WorkQueue, lock, shutdown_workers};
use crate::retry::RetryPolicy;
use crate::window::Window;
use crate::{AppError, Result};

#[derive(Default)]
struct WalkState {
    messages: Vec<Message>,
    pages: usize,
    misses: usize,
    failure: Option<AppError>,
}

/// Walks the paginated history of one channel.
pub struct HistoryWalker {
    api: Arc<dyn ChatApi>,
    window: Window,
    page_size: u16,
    workers: usize,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl HistoryWalker {
    pub fn new(
        api: Arc<dyn ChatApi>,
        window: Window,
        page_size: u16,
        workers: usize,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            window,
            page_size: page_size.max(1),
            workers: workers.max(1),
            retry,
            cancel,
        }
    }

    /// Every message of `channel` inside the window, in no particular order.
    pub async fn walk(&self, channel: &Channel) -> Result<Vec<Message>> {
        let started = Instant::now();
        let queue: WorkQueue<PageRequest> = WorkQueue::bounded(self.workers);
        let state = Arc::new(Mutex::new(WalkState::default()));

        let workers = {
            let api = Arc::clone(&self.api);
            let channel = Arc::new(channel.clone());
            let requeue = queue.clone();
            let state = Arc::clone(&state);
            let retry = self.retry.clone();
            let cancel = self.cancel.clone();
            queue.spawn_workers(self.workers, move |request| {
                let api = Arc::clone(&api);
                let channel = Arc::clone(&channel);
                let queue = requeue.clone();
                let state = Arc::clone(&state);
                let retry = retry.clone();
                let cancel = cancel.clone();
                async move {
                    let page = PageWork {
                        api: api.as_ref(),
                        channel: &channel,
                        queue: &queue,
                        state: &state,
                        retry: &retry,
                        cancel: &cancel,
                    };
                    if let Err(err) = page.run(request).await {
                        let mut state = lock(&state);
                        if state.failure.is_none() {
                            state.failure = Some(err);
                        }
                    }
                }
            })
        };

        queue
            .push(PageRequest {
                oldest: self.window.oldest_ts(),
                latest: self.window.latest_ts(),
                limit: self.page_size,
                attempt: 0,
            })
            .await?;
        queue.drained().await;
        shutdown_workers(workers).await?;

        let state = std::mem::take(&mut *lock(&state));
        info!(
            channel = %channel.id,
            name = %channel.name,
            pages = state.pages,
            misses = state.misses,
            messages = state.messages.len(),
            elapsed = ?started.elapsed(),
            "channel history done"
        );
        match state.failure {
            Some(err) => Err(err),
            None => Ok(state.messages),
        }
    }
}

struct PageWork<'a> {
    api: &'a dyn ChatApi,
    channel: &'a Channel,
    queue: &'a WorkQueue<PageRequest>,
    state: &'a Mutex<WalkState>,
    retry: &'a RetryPolicy,
    cancel: &'a CancellationToken,
}

impl PageWork<'_> {
    async fn run(&self, request: PageRequest) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        match self.api.fetch_history_page(self.channel, &request).await {
            Ok(page) => {
                // Continue before the follow-up is pushed so the barrier stays open.
                if page.has_more {
                    let next = self.continuation(&request, &page.messages)?;
                    self.queue.push(next).await?;
                }
                let mut state = lock(self.state);
                state.pages += 1;
                state.messages.extend(page.messages);
                Ok(())
            }
            Err(FetchError::RateLimited { retry_after_secs }) => {
                let attempts = request.attempt + 1;
                lock(self.state).misses += 1;
                if !self.retry.allows(attempts) {
                    return Err(AppError::RetriesExhausted {
                        channel: self.channel.id.clone(),
                        attempts,
                    });
                }
                let delay = self
                    .retry
                    .delay(attempts, retry_after_secs.map(Duration::from_secs));
                debug!(
                    channel = %self.channel.id,
                    attempts,
                    delay = ?delay,
                    "rate limited, retrying page"
                );
                if !delay.is_zero() {
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(AppError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                self.queue.push(request.retried()).await
            }
            Err(FetchError::Fatal(reason)) => Err(AppError::SlackApi(format!(
                "conversations.history failed for {}: {}",
                self.channel.id, reason
            ))),
        }
    }

    /// Next page request: same floor, ceiling moved to the oldest message seen.
    fn continuation(&self, request: &PageRequest, messages: &[Message]) -> Result<PageRequest> {
        let oldest = messages
            .iter()
            .map(|m| &m.ts)
            .min_by(|a, b| a.secs().total_cmp(&b.secs()))
            .ok_or_else(|| AppError::MalformedPage {
                channel: self.channel.id.clone(),
                reason: "more pages announced on an empty page".to_string(),
            })?;
        if oldest.secs() >= request.latest.secs() {
            return Err(AppError::MalformedPage {
                channel: self.channel.id.clone(),
                reason: format!("cursor did not move past {}", request.latest),
            });
        }
        Ok(request.continue_before(oldest.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{FakeChatApi, message};

    fn messages(channel: &str, count: usize) -> Vec<Message> {
        (0..count)
            .map(|i| message(channel, &format!("{}.000100", 1_000 + i), &[("eyes", 1)]))
            .collect()
    }

    fn walker(api: Arc<FakeChatApi>, page_size: u16, retry: RetryPolicy) -> HistoryWalker {
        HistoryWalker::new(
            api,
            Window::new(1_000, 10_000),
            page_size,
            10,
            retry,
            CancellationToken::new(),
        )
    }

    fn sorted_ts(mut msgs: Vec<Message>) -> Vec<String> {
        msgs.sort_by(|a, b| a.ts.secs().total_cmp(&b.ts.secs()));
        msgs.into_iter().map(|m| m.ts.as_str().to_string()).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_walk_single_page() {
        let api = Arc::new(FakeChatApi::new().with_channel("C1", messages("C1", 5)));
        let channel = api.channels()[0].clone();

        let result = walker(Arc::clone(&api), 1000, RetryPolicy::default())
            .walk(&channel)
            .await
            .unwrap();

        assert_eq!(result.len(), 5);
        assert_eq!(api.request_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_walk_follows_pages_backwards() {
        let all = messages("C1", 23);
        let expected = sorted_ts(all.clone());
        let api = Arc::new(FakeChatApi::new().with_channel("C1", all));
        let channel = api.channels()[0].clone();

        let result = walker(Arc::clone(&api), 5, RetryPolicy::default())
            .walk(&channel)
            .await
            .unwrap();

        assert_eq!(sorted_ts(result), expected);
        assert_eq!(api.request_count(), 5);

        let requests = api.requests.lock().unwrap();
        assert!(requests.iter().all(|(_, r)| r.oldest.as_str() == "1000"));
        assert_eq!(requests[0].1.latest.as_str(), "10000");
        assert_eq!(requests[1].1.latest.as_str(), "1018.000100");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_walk_retries_rate_limited_page() {
        let all = messages("C1", 12);
        let expected = sorted_ts(all.clone());
        let api = Arc::new(
            FakeChatApi::new()
                .with_channel("C1", all)
                .with_rate_limits("C1", 3),
        );
        let channel = api.channels()[0].clone();

        let result = walker(Arc::clone(&api), 5, RetryPolicy::unbounded_immediate())
            .walk(&channel)
            .await
            .unwrap();

        // No loss and no duplicates.
        assert_eq!(sorted_ts(result), expected);
        assert_eq!(api.request_count(), 3 + 3);
    }

    #[tokio::test]
    async fn test_walk_gives_up_after_max_attempts() {
        let api = Arc::new(
            FakeChatApi::new()
                .with_channel("C1", messages("C1", 3))
                .with_rate_limits("C1", 10),
        );
        let channel = api.channels()[0].clone();
        let retry = RetryPolicy {
            max_attempts: Some(2),
            ..RetryPolicy::unbounded_immediate()
        };

        let result = walker(Arc::clone(&api), 5, retry).walk(&channel).await;

        assert!(matches!(
            result,
            Err(AppError::RetriesExhausted { attempts: 2, .. })
        ));
        assert_eq!(api.request_count(), 2);
    }

    #[tokio::test]
    async fn test_walk_fatal_error_is_terminal() {
        let api = Arc::new(
            FakeChatApi::new()
                .with_channel("C1", messages("C1", 3))
                .with_fatal("C1", "not_in_channel"),
        );
        let channel = api.channels()[0].clone();

        let result = walker(Arc::clone(&api), 5, RetryPolicy::unbounded_immediate())
            .walk(&channel)
            .await;

        match result {
            Err(AppError::SlackApi(msg)) => assert!(msg.contains("not_in_channel")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(api.request_count(), 1);
    }

    #[tokio::test]
    async fn test_walk_cancelled_before_start() {
        let api = Arc::new(FakeChatApi::new().with_channel("C1", messages("C1", 3)));
        let channel = api.channels()[0].clone();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let walker = HistoryWalker::new(
            Arc::clone(&api) as Arc<dyn ChatApi>,
            Window::new(1_000, 10_000),
            5,
            2,
            RetryPolicy::default(),
            cancel,
        );

        assert!(matches!(walker.walk(&channel).await, Err(AppError::Cancelled)));
        assert_eq!(api.request_count(), 0);
    }

    #[tokio::test]
    async fn test_walk_empty_channel() {
        let api = Arc::new(FakeChatApi::new().with_channel("C1", Vec::new()));
        let channel = api.channels()[0].clone();

        let result = walker(Arc::clone(&api), 5, RetryPolicy::default())
            .walk(&channel)
            .await
            .unwrap();

        assert!(result.is_empty());
    }
}
