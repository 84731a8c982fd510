use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Protocol {
    MakerDAO,
    Aave,
    Arbitrum,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::MakerDAO, Protocol::Aave, Protocol::Arbitrum];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::MakerDAO => "MakerDAO",
            Protocol::Aave => "Aave",
            Protocol::Arbitrum => "Arbitrum",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown protocol `{0}`")]
pub struct UnknownProtocol(pub String);

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    /// Accepts the display names as well as the lowercase path segments used by the HTTP API.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "makerdao" | "maker" => Ok(Protocol::MakerDAO),
            "aave" => Ok(Protocol::Aave),
            "arbitrum" => Ok(Protocol::Arbitrum),
            _ => Err(UnknownProtocol(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalKind {
    Poll,
    ExecutiveProposal,
    OnChainProposal,
}

impl ProposalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalKind::Poll => "Poll",
            ProposalKind::ExecutiveProposal => "ExecutiveProposal",
            ProposalKind::OnChainProposal => "OnChainProposal",
        }
    }

    /// Label used in notification messages.
    pub fn label(&self) -> &'static str {
        match self {
            ProposalKind::Poll => "Poll",
            ProposalKind::ExecutiveProposal => "Executive Proposal",
            ProposalKind::OnChainProposal => "AIP",
        }
    }
}

impl FromStr for ProposalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Poll" => Ok(ProposalKind::Poll),
            "ExecutiveProposal" => Ok(ProposalKind::ExecutiveProposal),
            "OnChainProposal" => Ok(ProposalKind::OnChainProposal),
            other => Err(format!("unknown proposal kind `{other}`")),
        }
    }
}

/// Identity of a proposal across fetch cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProposalKey {
    pub title: String,
    pub protocol: Protocol,
}

impl ProposalKey {
    pub fn new(title: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            title: title.into(),
            protocol,
        }
    }
}

impl fmt::Display for ProposalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protocol, self.title)
    }
}

/// Canonical governance-vote record, rebuilt from upstream data on every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub title: String,
    pub protocol: Protocol,
    pub kind: ProposalKind,
    pub vote_type: String,
    pub options: Vec<String>,
    pub date_added: DateTime<Utc>,
    pub date_expiry: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_executed: Option<DateTime<Utc>>,
    pub vote_url: String,
    /// Empty when the proposal has no discussion thread.
    #[serde(default)]
    pub forum_url: String,
}

impl Proposal {
    pub fn key(&self) -> ProposalKey {
        ProposalKey::new(self.title.clone(), self.protocol)
    }
}
