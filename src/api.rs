use async_trait::async_trait;
use url::Url;

use crate::error::FetchError;
use crate::model::{Channel, Message};
use crate::window::Timestamp;
use crate::Result;

/// Parameters for one `conversations.history` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub oldest: Timestamp,
    pub latest: Timestamp,
    pub limit: u16,
    /// Rate limited attempts already spent on this request.
    pub attempt: u32,
}

impl PageRequest {
    /// Request for the page that precedes `before`, keeping the original floor.
    pub fn continue_before(&self, before: Timestamp) -> Self {
        Self {
            oldest: self.oldest.clone(),
            latest: before,
            limit: self.limit,
            attempt: 0,
        }
    }

    pub fn retried(mut self) -> Self {
        self.attempt += 1;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

/// The chat workspace as seen by the harvester and the presenter.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn list_channels(&self) -> Result<Vec<Channel>>;

    async fn fetch_history_page(
        &self,
        channel: &Channel,
        request: &PageRequest,
    ) -> std::result::Result<HistoryPage, FetchError>;

    async fn permalink(&self, channel_id: &str, ts: &Timestamp) -> Result<Url>;

    async fn post_message(&self, channel_id: &str, text: &str) -> Result<()>;
}
