use std::collections::HashMap;

use async_trait::async_trait;
use slack_morphism::errors::SlackClientError;
use slack_morphism::prelude::*;
use tracing::debug;
use url::Url;

use crate::api::{ChatApi, HistoryPage, PageRequest};
use crate::error::FetchError;
use crate::model::{Channel, Message, Reaction};
use crate::window::Timestamp;
use crate::{AppError, Result};

/// [`ChatApi`] backed by the Slack Web API.
pub struct SlackChatApi {
    client: SlackHyperClient,
    token: SlackApiToken,
    /// User id to user name, loaded once up front.
    members: HashMap<String, String>,
}

impl SlackChatApi {
    pub async fn connect(token: &str) -> Result<Self> {
        let connector =
            SlackClientHyperConnector::new().map_err(|e| AppError::SlackApi(e.to_string()))?;
        let mut api = Self {
            client: SlackClient::new(connector),
            token: SlackApiToken::new(SlackApiTokenValue(token.to_string())),
            members: HashMap::new(),
        };
        api.members = api.fetch_members().await?;
        debug!(members = api.members.len(), "loaded user directory");
        Ok(api)
    }

    async fn fetch_members(&self) -> Result<HashMap<String, String>> {
        let session = self.client.open_session(&self.token);

        let mut members = HashMap::new();
        let mut cursor: Option<SlackCursorId> = None;

        loop {
            let request = SlackApiUsersListRequest::new()
                .with_limit(200)
                .opt_cursor(cursor);

            let response = session
                .users_list(&request)
                .await
                .map_err(|e| AppError::SlackApi(e.to_string()))?;

            for user in response.members {
                let name = user.name.clone().unwrap_or_else(|| user.id.0.clone());
                members.insert(user.id.0, name);
            }

            match next_cursor(response.response_metadata) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(members)
    }

    fn member_name(&self, user: Option<&SlackUserId>) -> String {
        match user {
            Some(id) => self
                .members
                .get(&id.0)
                .cloned()
                .unwrap_or_else(|| id.0.clone()),
            None => String::new(),
        }
    }

    fn parse_message(
        &self,
        channel_id: &str,
        msg: &SlackHistoryMessage,
    ) -> std::result::Result<Message, FetchError> {
        let ts = Timestamp::parse(&msg.origin.ts.0)
            .map_err(|e| FetchError::Fatal(e.to_string()))?;
        let reactions = msg
            .content
            .reactions
            .iter()
            .flatten()
            .map(|r| Reaction {
                name: r.name.0.clone(),
                count: r.count,
                users: r.users.iter().map(|u| self.member_name(Some(u))).collect(),
            })
            .collect();

        Ok(Message::new(
            channel_id,
            self.member_name(msg.sender.user.as_ref()),
            msg.content.text.clone().unwrap_or_default(),
            ts,
            reactions,
        ))
    }
}

fn next_cursor(meta: Option<SlackResponseMetadata>) -> Option<SlackCursorId> {
    meta.and_then(|m| m.next_cursor)
        .filter(|cursor| !cursor.0.is_empty())
}

fn classify(err: SlackClientError) -> FetchError {
    match err {
        SlackClientError::RateLimitError(e) => FetchError::RateLimited {
            retry_after_secs: e.retry_after.map(|d| d.as_secs()),
        },
        SlackClientError::ApiError(ref e) if e.code == "ratelimited" => {
            FetchError::RateLimited {
                retry_after_secs: None,
            }
        }
        other => FetchError::Fatal(other.to_string()),
    }
}

#[async_trait]
impl ChatApi for SlackChatApi {
    async fn list_channels(&self) -> Result<Vec<Channel>> {
        let session = self.client.open_session(&self.token);

        let mut channels = Vec::new();
        let mut cursor: Option<SlackCursorId> = None;

        loop {
            let request = SlackApiConversationsListRequest::new()
                .with_limit(200)
                .with_types(vec![SlackConversationType::Public])
                .opt_cursor(cursor);

            let response = session
                .conversations_list(&request)
                .await
                .map_err(|e| AppError::SlackApi(e.to_string()))?;

            for channel in response.channels {
                channels.push(Channel {
                    id: channel.id.0.clone(),
                    name: channel.name.clone().unwrap_or_else(|| "unknown".to_string()),
                    is_group: channel.flags.is_group.unwrap_or(false),
                });
            }

            match next_cursor(response.response_metadata) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(channels)
    }

    async fn fetch_history_page(
        &self,
        channel: &Channel,
        request: &PageRequest,
    ) -> std::result::Result<HistoryPage, FetchError> {
        let session = self.client.open_session(&self.token);

        let api_request = SlackApiConversationsHistoryRequest::new()
            .with_channel(SlackChannelId(channel.id.clone()))
            .with_oldest(SlackTs(request.oldest.to_string()))
            .with_latest(SlackTs(request.latest.to_string()))
            .with_limit(request.limit);

        let response = session
            .conversations_history(&api_request)
            .await
            .map_err(classify)?;

        let messages = response
            .messages
            .iter()
            .map(|msg| self.parse_message(&channel.id, msg))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(HistoryPage {
            messages,
            has_more: next_cursor(response.response_metadata).is_some(),
        })
    }

    async fn permalink(&self, channel_id: &str, ts: &Timestamp) -> Result<Url> {
        let session = self.client.open_session(&self.token);
        let request = SlackApiChatGetPermalinkRequest::new(
            SlackChannelId(channel_id.to_string()),
            SlackTs(ts.to_string()),
        );
        let response = session
            .chat_get_permalink(&request)
            .await
            .map_err(|e| AppError::SlackApi(e.to_string()))?;
        Ok(response.permalink)
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> Result<()> {
        let session = self.client.open_session(&self.token);
        let request = SlackApiChatPostMessageRequest::new(
            SlackChannelId(channel_id.to_string()),
            SlackMessageContent::new().with_text(text.to_string()),
        )
        .with_unfurl_links(true);
        session
            .chat_post_message(&request)
            .await
            .map_err(|e| AppError::SlackApi(e.to_string()))?;
        Ok(())
    }
}
