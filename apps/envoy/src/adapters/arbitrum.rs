use super::{ProtocolAdapter, decode_records};
use crate::{
    config::SourcesConfig,
    errors::{FetchError, ParseError},
    http_client::HttpClient,
    models::{
        RawRecord, SourceKind,
        tally::{PROPOSALS_QUERY, TallyResponse},
    },
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

/// Tally GraphQL feed for the Arbitrum governors.
pub struct ArbitrumAdapter {
    http: HttpClient,
    api_url: String,
    api_key: Option<String>,
    chain_id: String,
    governors: Vec<String>,
    page_limit: u32,
}

impl ArbitrumAdapter {
    pub fn new(http: HttpClient, sources: &SourcesConfig) -> Self {
        Self {
            http,
            api_url: sources.tally_api_url.clone(),
            api_key: sources.tally_api_key.clone(),
            chain_id: sources.arbitrum_chain_id.clone(),
            governors: sources.arbitrum_governors.clone(),
            page_limit: sources.arbitrum_page_limit,
        }
    }

    fn request_body(&self) -> Value {
        json!({
            "query": PROPOSALS_QUERY,
            "variables": {
                "chainId": self.chain_id,
                "governors": self.governors,
                "pagination": { "limit": self.page_limit, "offset": 0 },
                "sort": { "field": "START_BLOCK", "order": "DESC" },
            },
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match self.api_key.as_deref().map(HeaderValue::from_str) {
            Some(Ok(value)) => {
                headers.insert(HeaderName::from_static("api-key"), value);
            }
            Some(Err(err)) => warn!(error = %err, "TALLY_API_KEY is not a valid header value"),
            None => warn!("TALLY_API_KEY not set, Tally may reject the request"),
        }
        headers
    }
}

#[async_trait]
impl ProtocolAdapter for ArbitrumAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::Arbitrum
    }

    #[instrument(skip(self), fields(source = %self.source(), limit = self.page_limit))]
    async fn fetch_raw(&self) -> Result<Vec<RawRecord>, FetchError> {
        let response: TallyResponse = self
            .http
            .post_json(&self.api_url, &self.request_body(), self.headers())
            .await
            .map_err(|e| FetchError::transport(self.source(), e))?;

        if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
            let message = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FetchError::Upstream {
                origin: self.source(),
                message,
            });
        }

        let proposals = response
            .data
            .and_then(|data| data.proposals)
            .ok_or_else(|| ParseError::new(self.source(), "data.proposals"))?;

        let records = decode_records(self.source(), proposals, RawRecord::Arbitrum);
        info!(count = records.len(), "Fetched Arbitrum proposals");
        Ok(records)
    }
}
