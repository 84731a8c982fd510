use super::{ProtocolAdapter, decode_records, expect_array};
use crate::{
    errors::{FetchError, ParseError},
    http_client::HttpClient,
    models::{RawRecord, SourceKind},
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument};

pub struct MakerPollsAdapter {
    http: HttpClient,
    base_url: String,
}

impl MakerPollsAdapter {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ProtocolAdapter for MakerPollsAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::MakerPolls
    }

    #[instrument(skip(self), fields(source = %self.source()))]
    async fn fetch_raw(&self) -> Result<Vec<RawRecord>, FetchError> {
        let url = format!("{}/api/polling/all-polls", self.base_url);
        let mut body: Value = self
            .http
            .get_json(&url)
            .await
            .map_err(|e| FetchError::transport(self.source(), e))?;

        let polls = body
            .get_mut("polls")
            .map(Value::take)
            .ok_or_else(|| ParseError::new(self.source(), "`polls` field"))?;
        let polls = expect_array(self.source(), polls, "`polls` array")?;

        let records = decode_records(self.source(), polls, RawRecord::MakerPoll);
        info!(count = records.len(), "Fetched MakerDAO polls");
        Ok(records)
    }
}
