use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AaveRawProposal {
    pub ipfs: Option<AaveIpfs>,
    pub proposal: Option<AaveOnChain>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AaveIpfs {
    pub title: Option<String>,
    pub id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AaveOnChain {
    pub id: Option<i64>,
    /// Epoch seconds.
    pub creation_timestamp: Option<i64>,
    pub start_timestamp: Option<i64>,
    pub expiration_timestamp: Option<i64>,
}
