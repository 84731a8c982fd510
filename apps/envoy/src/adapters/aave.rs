use super::{ProtocolAdapter, decode_records, expect_array, extract_next_data};
use crate::{
    errors::{FetchError, ParseError},
    http_client::HttpClient,
    models::{RawRecord, SourceKind},
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument};

const PROPOSALS_POINTER: &str = "/props/pageProps/proposals";

/// Reads the governance page's server-rendered `__NEXT_DATA__` payload.
pub struct AaveAdapter {
    http: HttpClient,
    base_url: String,
}

impl AaveAdapter {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ProtocolAdapter for AaveAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::Aave
    }

    #[instrument(skip(self), fields(source = %self.source()))]
    async fn fetch_raw(&self) -> Result<Vec<RawRecord>, FetchError> {
        let url = format!("{}/governance/", self.base_url);
        let html = self
            .http
            .get_text(&url)
            .await
            .map_err(|e| FetchError::transport(self.source(), e))?;

        let mut next_data = extract_next_data(self.source(), &html)?;
        let proposals = next_data
            .pointer_mut(PROPOSALS_POINTER)
            .map(Value::take)
            .ok_or_else(|| ParseError::new(self.source(), "props.pageProps.proposals"))?;
        let items = expect_array(self.source(), proposals, "props.pageProps.proposals array")?;

        let records = decode_records(self.source(), items, RawRecord::Aave);
        info!(count = records.len(), "Fetched Aave proposals");
        Ok(records)
    }
}
