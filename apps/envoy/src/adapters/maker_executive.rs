use super::{ProtocolAdapter, decode_records, expect_array};
use crate::{
    errors::FetchError,
    http_client::HttpClient,
    models::{RawRecord, SourceKind},
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument};

pub struct MakerExecutiveAdapter {
    http: HttpClient,
    base_url: String,
}

impl MakerExecutiveAdapter {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ProtocolAdapter for MakerExecutiveAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::MakerExecutive
    }

    #[instrument(skip(self), fields(source = %self.source()))]
    async fn fetch_raw(&self) -> Result<Vec<RawRecord>, FetchError> {
        let url = format!("{}/api/executive", self.base_url);
        let body: Value = self
            .http
            .get_json(&url)
            .await
            .map_err(|e| FetchError::transport(self.source(), e))?;

        let items = expect_array(self.source(), body, "executive proposal array")?;
        let records = decode_records(self.source(), items, RawRecord::MakerExecutive);

        info!(count = records.len(), "Fetched MakerDAO executive proposals");
        Ok(records)
    }
}
