use crate::{
    errors::StoreError,
    proposal::{Proposal, ProposalKey, ProposalKind, Protocol},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use envoy_db::models::proposal;
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, sea_query::OnConflict,
};
use std::collections::{HashMap, HashSet, hash_map::Entry};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Persistence of proposals keyed by `(title, protocol)`. Records are never updated or deleted.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_by_key(&self, key: &ProposalKey) -> Result<Option<Proposal>, StoreError>;

    /// Records a proposal once. A second call for the same key yields
    /// [`StoreError::ConstraintViolation`] and writes nothing.
    async fn upsert(&self, proposal: &Proposal) -> Result<(), StoreError>;

    /// Proposals with `start < date_expiry < end`, earliest expiry first.
    async fn find_expiring_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Proposal>, StoreError>;

    async fn known_keys(&self, protocol: Protocol) -> Result<HashSet<ProposalKey>, StoreError>;
}

pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_active_model(p: &Proposal) -> proposal::ActiveModel {
    proposal::ActiveModel {
        id: NotSet,
        title: Set(p.title.clone()),
        protocol: Set(p.protocol.as_str().to_string()),
        kind: Set(p.kind.as_str().to_string()),
        vote_type: Set(p.vote_type.clone()),
        options: Set(serde_json::Value::from(p.options.clone())),
        date_added: Set(p.date_added.naive_utc()),
        date_expiry: Set(p.date_expiry.map(|d| d.naive_utc())),
        date_executed: Set(p.date_executed.map(|d| d.naive_utc())),
        vote_url: Set(p.vote_url.clone()),
        forum_url: Set(p.forum_url.clone()),
        created_at: Set(Utc::now().naive_utc()),
    }
}

fn from_model(model: proposal::Model) -> Result<Proposal, StoreError> {
    let corrupt = |detail: String| StoreError::Corrupt {
        id: model.id,
        detail,
    };

    let protocol = model
        .protocol
        .parse::<Protocol>()
        .map_err(|e| corrupt(e.to_string()))?;
    let kind = model.kind.parse::<ProposalKind>().map_err(corrupt)?;
    let options = serde_json::from_value::<Vec<String>>(model.options.clone())
        .map_err(|e| corrupt(format!("options: {e}")))?;

    Ok(Proposal {
        title: model.title,
        protocol,
        kind,
        vote_type: model.vote_type,
        options,
        date_added: model.date_added.and_utc(),
        date_expiry: model.date_expiry.map(|d| d.and_utc()),
        date_executed: model.date_executed.map(|d| d.and_utc()),
        vote_url: model.vote_url,
        forum_url: model.forum_url,
    })
}

#[async_trait]
impl Store for SeaOrmStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn find_by_key(&self, key: &ProposalKey) -> Result<Option<Proposal>, StoreError> {
        proposal::Entity::find()
            .filter(proposal::Column::Title.eq(key.title.as_str()))
            .filter(proposal::Column::Protocol.eq(key.protocol.as_str()))
            .one(&self.db)
            .await?
            .map(from_model)
            .transpose()
    }

    #[instrument(skip(self, record), fields(protocol = %record.protocol, title = %record.title))]
    async fn upsert(&self, record: &Proposal) -> Result<(), StoreError> {
        let on_conflict = OnConflict::columns([proposal::Column::Title, proposal::Column::Protocol])
            .do_nothing()
            .to_owned();

        let inserted = proposal::Entity::insert(to_active_model(record))
            .on_conflict(on_conflict)
            .exec_without_returning(&self.db)
            .await?;

        if inserted == 0 {
            return Err(StoreError::ConstraintViolation {
                key: record.key(),
            });
        }

        debug!("Proposal recorded");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_expiring_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Proposal>, StoreError> {
        proposal::Entity::find()
            .filter(proposal::Column::DateExpiry.gt(start.naive_utc()))
            .filter(proposal::Column::DateExpiry.lt(end.naive_utc()))
            .order_by_asc(proposal::Column::DateExpiry)
            .order_by_asc(proposal::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(from_model)
            .collect()
    }

    #[instrument(skip(self))]
    async fn known_keys(&self, protocol: Protocol) -> Result<HashSet<ProposalKey>, StoreError> {
        let titles: Vec<String> = proposal::Entity::find()
            .select_only()
            .column(proposal::Column::Title)
            .filter(proposal::Column::Protocol.eq(protocol.as_str()))
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(titles
            .into_iter()
            .map(|title| ProposalKey::new(title, protocol))
            .collect())
    }
}

/// Process-local store for tests and embedders. The binary runs without a store
/// when `DATABASE_URL` is unset, so a restart does not re-announce every open proposal.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<ProposalKey, Proposal>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_by_key(&self, key: &ProposalKey) -> Result<Option<Proposal>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn upsert(&self, proposal: &Proposal) -> Result<(), StoreError> {
        match self.records.write().await.entry(proposal.key()) {
            Entry::Occupied(entry) => Err(StoreError::ConstraintViolation {
                key: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(proposal.clone());
                Ok(())
            }
        }
    }

    async fn find_expiring_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Proposal>, StoreError> {
        let mut found: Vec<Proposal> = self
            .records
            .read()
            .await
            .values()
            .filter(|p| p.date_expiry.is_some_and(|e| e > start && e < end))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.date_expiry
                .cmp(&b.date_expiry)
                .then_with(|| a.title.cmp(&b.title))
        });
        Ok(found)
    }

    async fn known_keys(&self, protocol: Protocol) -> Result<HashSet<ProposalKey>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .keys()
            .filter(|key| key.protocol == protocol)
            .cloned()
            .collect())
    }
}
