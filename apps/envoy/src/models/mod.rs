pub mod aave;
pub mod maker;
pub mod tally;

use crate::proposal::Protocol;
use serde::Serialize;
use std::fmt;

pub use aave::AaveRawProposal;
pub use maker::{MakerRawExecutive, MakerRawPoll};
pub use tally::ArbitrumRawProposal;

/// Upstream feed a record was fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceKind {
    MakerPolls,
    MakerExecutive,
    Aave,
    Arbitrum,
}

impl SourceKind {
    pub fn protocol(&self) -> Protocol {
        match self {
            SourceKind::MakerPolls | SourceKind::MakerExecutive => Protocol::MakerDAO,
            SourceKind::Aave => Protocol::Aave,
            SourceKind::Arbitrum => Protocol::Arbitrum,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::MakerPolls => "MakerDAO polls",
            SourceKind::MakerExecutive => "MakerDAO executive",
            SourceKind::Aave => "Aave",
            SourceKind::Arbitrum => "Arbitrum",
        };
        f.write_str(name)
    }
}

/// Pre-normalization record; each adapter produces exactly one variant.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    MakerPoll(MakerRawPoll),
    MakerExecutive(MakerRawExecutive),
    Aave(AaveRawProposal),
    Arbitrum(ArbitrumRawProposal),
    /// Element whose JSON shape did not decode. The normalizer reports it as rejected.
    Undecodable {
        source: SourceKind,
        title: Option<String>,
        error: String,
    },
}

impl RawRecord {
    pub fn source(&self) -> SourceKind {
        match self {
            RawRecord::MakerPoll(_) => SourceKind::MakerPolls,
            RawRecord::MakerExecutive(_) => SourceKind::MakerExecutive,
            RawRecord::Aave(_) => SourceKind::Aave,
            RawRecord::Arbitrum(_) => SourceKind::Arbitrum,
            RawRecord::Undecodable { source, .. } => *source,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.source().protocol()
    }

    /// Best-effort title for log lines about records that fail to normalize.
    pub fn title_hint(&self) -> Option<&str> {
        match self {
            RawRecord::MakerPoll(p) => p.title.as_deref(),
            RawRecord::MakerExecutive(p) => p.title.as_deref(),
            RawRecord::Aave(p) => p.ipfs.as_ref().and_then(|i| i.title.as_deref()),
            RawRecord::Arbitrum(p) => p.title.as_deref(),
            RawRecord::Undecodable { title, .. } => title.as_deref(),
        }
    }
}
