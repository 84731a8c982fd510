#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use envoy::{
    adapters::ProtocolAdapter,
    errors::{DeliveryError, FetchError, StoreError},
    models::{RawRecord, SourceKind},
    normalizer::Normalizer,
    notifier::{Channel, Notifier},
    proposal::{Proposal, ProposalKey, Protocol},
    store::{MemoryStore, Store},
};
use serde_json::json;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

pub fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn normalizer() -> Normalizer {
    Normalizer::with_bases(
        "https://vote.makerdao.com",
        "https://app.aave.com",
        "https://www.tally.xyz",
    )
}

pub fn maker_poll(title: &str, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> RawRecord {
    let mut raw = json!({
        "title": title,
        "slug": title.to_lowercase().replace(' ', "-"),
        "startDate": start.to_rfc3339(),
        "parameters": { "inputFormat": { "type": "single-choice" } },
        "options": { "0": "Abstain", "1": "Yes", "2": "No" },
        "discussionLink": "https://forum.makerdao.com/t/1"
    });
    if let Some(end) = end {
        raw["endDate"] = json!(end.to_rfc3339());
    }
    RawRecord::MakerPoll(serde_json::from_value(raw).unwrap())
}

pub fn aave_proposal(id: i64, title: &str, created: DateTime<Utc>) -> RawRecord {
    RawRecord::Aave(
        serde_json::from_value(json!({
            "ipfs": { "title": title, "id": id },
            "proposal": { "id": id, "creationTimestamp": created.timestamp(), "expirationTimestamp": 0 }
        }))
        .unwrap(),
    )
}

pub fn arbitrum_proposal(
    id: &str,
    title: &str,
    created: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> RawRecord {
    RawRecord::Arbitrum(
        serde_json::from_value(json!({
            "id": id,
            "title": title,
            "voteStats": [{ "support": "FOR" }, { "support": "AGAINST" }, { "support": "ABSTAIN" }],
            "end": { "timestamp": end.map(|e| e.to_rfc3339()) },
            "createdTransaction": { "block": { "timestamp": created.to_rfc3339() } }
        }))
        .unwrap(),
    )
}

/// Adapter returning a fixed batch or a fixed upstream failure.
pub struct StaticAdapter {
    source: SourceKind,
    result: Result<Vec<RawRecord>, String>,
    delay: Option<std::time::Duration>,
}

impl StaticAdapter {
    pub fn ok(source: SourceKind, records: Vec<RawRecord>) -> Arc<dyn ProtocolAdapter> {
        Arc::new(Self {
            source,
            result: Ok(records),
            delay: None,
        })
    }

    pub fn failing(source: SourceKind, message: &str) -> Arc<dyn ProtocolAdapter> {
        Arc::new(Self {
            source,
            result: Err(message.to_string()),
            delay: None,
        })
    }

    pub fn slow(source: SourceKind, delay: std::time::Duration) -> Arc<dyn ProtocolAdapter> {
        Arc::new(Self {
            source,
            result: Ok(Vec::new()),
            delay: Some(delay),
        })
    }
}

#[async_trait]
impl ProtocolAdapter for StaticAdapter {
    fn source(&self) -> SourceKind {
        self.source
    }

    async fn fetch_raw(&self) -> Result<Vec<RawRecord>, FetchError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone().map_err(|message| FetchError::Upstream {
            origin: self.source,
            message,
        })
    }
}

/// Records every delivered message; sends to `failing` channels are rejected.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Channel, String)>>,
    pub failing: HashSet<Channel>,
}

impl RecordingNotifier {
    pub fn failing_on(channels: &[Channel]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: channels.iter().copied().collect(),
        }
    }

    pub fn messages_to(&self, channel: Channel) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, channel: &Channel, message: &str) -> Result<(), DeliveryError> {
        if self.failing.contains(channel) {
            return Err(DeliveryError::Rejected {
                channel: *channel,
                description: "chat not found".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((*channel, message.to_string()));
        Ok(())
    }
}

/// Memory-backed store whose snapshot reads always fail.
#[derive(Default)]
pub struct SnapshotlessStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl Store for SnapshotlessStore {
    async fn find_by_key(&self, key: &ProposalKey) -> Result<Option<Proposal>, StoreError> {
        self.inner.find_by_key(key).await
    }

    async fn upsert(&self, proposal: &Proposal) -> Result<(), StoreError> {
        self.inner.upsert(proposal).await
    }

    async fn find_expiring_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Proposal>, StoreError> {
        self.inner.find_expiring_between(start, end).await
    }

    async fn known_keys(&self, _protocol: Protocol) -> Result<HashSet<ProposalKey>, StoreError> {
        Err(StoreError::Database(sea_orm::DbErr::Custom(
            "connection reset".to_string(),
        )))
    }
}

pub fn hours(h: i64) -> Duration {
    Duration::hours(h)
}
