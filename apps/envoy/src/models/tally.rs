use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ARBITRUM_CHAIN_ID: &str = "eip155:42161";

/// Arbitrum Core and Treasury governors.
pub const ARBITRUM_GOVERNORS: [&str; 2] = [
    "0x789fC99093B09aD01C34DC7251D0C89ce743e5a4",
    "0xf07DeD9dC292157749B6Fd268E37DF6EA38395B9",
];

pub const PROPOSALS_QUERY: &str = r#"query Proposals($chainId: ChainID!, $pagination: Pagination, $sort: ProposalSort, $governors: [Address!]) {
  proposals(chainId: $chainId, pagination: $pagination, sort: $sort, governors: $governors) {
    id
    title
    voteStats {
      support
    }
    start {
      timestamp
    }
    end {
      timestamp
    }
    createdTransaction {
      block {
        timestamp
      }
    }
  }
}"#;

#[derive(Debug, Deserialize)]
pub struct TallyResponse {
    pub data: Option<TallyData>,
    pub errors: Option<Vec<TallyError>>,
}

#[derive(Debug, Deserialize)]
pub struct TallyData {
    pub proposals: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct TallyError {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArbitrumRawProposal {
    pub id: Option<String>,
    pub title: Option<String>,
    pub vote_stats: Option<Vec<TallyVoteStat>>,
    pub start: Option<TallyTimestamp>,
    pub end: Option<TallyTimestamp>,
    pub created_transaction: Option<TallyTransaction>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TallyVoteStat {
    pub support: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TallyTimestamp {
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TallyTransaction {
    pub block: Option<TallyTimestamp>,
}
