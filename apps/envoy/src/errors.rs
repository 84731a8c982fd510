use crate::{
    models::SourceKind,
    notifier::Channel,
    proposal::{ProposalKey, Protocol},
};
use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single outbound HTTP exchange, after retries.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed with HTTP {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("request to {url} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: usize,
        last_error: String,
    },
    #[error("request to {url} could not be sent: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The expected structure was absent from an upstream response.
#[derive(Debug, Error)]
#[error("{origin} response is missing {expected}")]
pub struct ParseError {
    pub origin: SourceKind,
    pub expected: String,
}

impl ParseError {
    pub fn new(origin: SourceKind, expected: impl Into<String>) -> Self {
        Self {
            origin,
            expected: expected.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{origin} fetch failed: {cause}")]
    Transport {
        origin: SourceKind,
        #[source]
        cause: TransportError,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{origin} upstream reported errors: {message}")]
    Upstream { origin: SourceKind, message: String },
}

impl FetchError {
    pub fn transport(origin: SourceKind, cause: TransportError) -> Self {
        FetchError::Transport { origin, cause }
    }

    pub fn origin(&self) -> SourceKind {
        match self {
            FetchError::Transport { origin, .. } | FetchError::Upstream { origin, .. } => *origin,
            FetchError::Parse(e) => e.origin,
        }
    }
}

/// A single raw record could not be mapped to a proposal. Never fails the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{protocol} record has missing or invalid `{field}`: {detail}")]
pub struct MappingError {
    pub protocol: Protocol,
    pub field: &'static str,
    pub detail: String,
}

impl MappingError {
    pub fn missing(protocol: Protocol, field: &'static str) -> Self {
        Self {
            protocol,
            field,
            detail: "field is absent".to_string(),
        }
    }

    pub fn invalid(protocol: Protocol, field: &'static str, detail: impl Into<String>) -> Self {
        Self {
            protocol,
            field,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is already recorded; callers treat this as "seen before".
    #[error("proposal {key} is already recorded")]
    ConstraintViolation { key: ProposalKey },
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("stored proposal {id} is unreadable: {detail}")]
    Corrupt { id: i32, detail: String },
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no destination configured for channel {channel}")]
    UnconfiguredChannel { channel: Channel },
    #[error("delivery to {channel} failed: {cause}")]
    Transport {
        channel: Channel,
        #[source]
        cause: TransportError,
    },
    #[error("delivery to {channel} was rejected: {description}")]
    Rejected {
        channel: Channel,
        description: String,
    },
}

/// Outbound call families bounded by a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Store,
    Notify,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Store => "store",
            Stage::Notify => "notify",
        };
        f.write_str(name)
    }
}

/// Terminal failure of one protocol branch within a cycle.
#[derive(Debug, Error)]
pub enum BranchFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: Stage, seconds: u64 },
    #[error("persisting proposals failed: {0}")]
    Store(#[from] StoreError),
    #[error("cycle cancelled before persisting")]
    Cancelled,
}
