use crate::{
    config::TelegramConfig,
    errors::{DeliveryError, TransportError},
    http_client::HttpClient,
    proposal::Protocol,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};
use tracing::{debug, info, instrument};

/// Telegram rejects longer message texts.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Protocol(Protocol),
    Diagnostics,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Protocol(protocol) => write!(f, "{protocol}"),
            Channel::Diagnostics => f.write_str("diagnostics"),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: &Channel, message: &str) -> Result<(), DeliveryError>;
}

/// Used when no bot token is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, channel: &Channel, message: &str) -> Result<(), DeliveryError> {
        info!(%channel, message, "Notification");
        Ok(())
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

pub struct TelegramNotifier {
    http: HttpClient,
    endpoint: String,
    chats: HashMap<Channel, String>,
}

impl TelegramNotifier {
    pub fn new(http: HttpClient, config: &TelegramConfig) -> Self {
        let chats = [
            (Channel::Protocol(Protocol::MakerDAO), &config.maker_chat_id),
            (Channel::Protocol(Protocol::Aave), &config.aave_chat_id),
            (Channel::Protocol(Protocol::Arbitrum), &config.arbitrum_chat_id),
            (Channel::Diagnostics, &config.diagnostics_chat_id),
        ]
        .into_iter()
        .filter_map(|(channel, chat)| chat.clone().map(|chat| (channel, chat)))
        .collect();

        Self {
            http,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
            chats,
        }
    }

    async fn send_chunk(
        &self,
        channel: &Channel,
        chat_id: &str,
        text: &str,
    ) -> Result<(), DeliveryError> {
        let body = SendMessage {
            chat_id,
            text,
            disable_web_page_preview: true,
        };

        let response: TelegramResponse = self
            .http
            .post_json(&self.endpoint, &body, HeaderMap::new())
            .await
            .map_err(|cause| match cause {
                TransportError::Status { body, .. } => DeliveryError::Rejected {
                    channel: *channel,
                    description: serde_json::from_str::<TelegramResponse>(&body)
                        .ok()
                        .and_then(|r| r.description)
                        .unwrap_or(body),
                },
                cause => DeliveryError::Transport {
                    channel: *channel,
                    cause,
                },
            })?;

        if !response.ok {
            return Err(DeliveryError::Rejected {
                channel: *channel,
                description: response.description.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, message), fields(channel = %channel, len = message.len()))]
    async fn send(&self, channel: &Channel, message: &str) -> Result<(), DeliveryError> {
        let chat_id = self
            .chats
            .get(channel)
            .ok_or(DeliveryError::UnconfiguredChannel { channel: *channel })?;

        for chunk in split_message(message, TELEGRAM_MESSAGE_LIMIT) {
            self.send_chunk(channel, chat_id, &chunk).await?;
        }
        debug!("Message delivered");
        Ok(())
    }
}

/// Splits on line boundaries so each part has at most `limit` characters.
/// Single lines longer than `limit` are cut mid-line.
pub fn split_message(message: &str, limit: usize) -> Vec<String> {
    if message.chars().count() <= limit {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in message.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                if piece.len() == limit {
                    parts.push(piece.iter().collect());
                } else {
                    current = piece.iter().collect();
                    current_len = piece.len();
                }
            }
        } else {
            current.push_str(line);
            current_len += line_len;
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
