use crate::{
    config::SourcesConfig,
    errors::{FetchError, ParseError},
    http_client::HttpClient,
    models::{RawRecord, SourceKind},
    proposal::Protocol,
};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

pub mod aave;
pub mod arbitrum;
pub mod maker_executive;
pub mod maker_polls;

pub use aave::AaveAdapter;
pub use arbitrum::ArbitrumAdapter;
pub use maker_executive::MakerExecutiveAdapter;
pub use maker_polls::MakerPollsAdapter;

/// One upstream feed. An empty result is a success.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    fn source(&self) -> SourceKind;

    fn protocol(&self) -> Protocol {
        self.source().protocol()
    }

    async fn fetch_raw(&self) -> Result<Vec<RawRecord>, FetchError>;
}

pub fn build_adapters(http: &HttpClient, sources: &SourcesConfig) -> Vec<Arc<dyn ProtocolAdapter>> {
    vec![
        Arc::new(MakerPollsAdapter::new(http.clone(), &sources.maker_base_url)),
        Arc::new(MakerExecutiveAdapter::new(http.clone(), &sources.maker_base_url)),
        Arc::new(AaveAdapter::new(http.clone(), &sources.aave_base_url)),
        Arc::new(ArbitrumAdapter::new(http.clone(), sources)),
    ]
}

/// Decodes each element on its own. Elements of the wrong shape are kept as
/// [`RawRecord::Undecodable`] so they surface as rejected records.
pub(crate) fn decode_records<T, F>(source: SourceKind, items: Vec<Value>, wrap: F) -> Vec<RawRecord>
where
    T: DeserializeOwned,
    F: Fn(T) -> RawRecord,
{
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let title = title_of(&item);
            match serde_json::from_value::<T>(item) {
                Ok(raw) => wrap(raw),
                Err(err) => {
                    warn!(%source, index, error = %err, "Record does not match the expected shape");
                    RawRecord::Undecodable {
                        source,
                        title,
                        error: err.to_string(),
                    }
                }
            }
        })
        .collect()
}

/// Title of an element, read before decoding so failures can still be named.
fn title_of(item: &Value) -> Option<String> {
    ["/title", "/ipfs/title"]
        .iter()
        .find_map(|path| item.pointer(path).and_then(Value::as_str))
        .map(str::to_string)
}

pub(crate) fn expect_array(
    source: SourceKind,
    value: Value,
    expected: &str,
) -> Result<Vec<Value>, ParseError> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(ParseError::new(source, expected)),
    }
}

/// Reads the JSON payload embedded in `script#__NEXT_DATA__`.
pub(crate) fn extract_next_data(source: SourceKind, html: &str) -> Result<Value, ParseError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script#__NEXT_DATA__")
        .map_err(|_| ParseError::new(source, "a valid __NEXT_DATA__ selector"))?;

    let payload = document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .ok_or_else(|| ParseError::new(source, "script#__NEXT_DATA__"))?;

    serde_json::from_str(payload.trim())
        .map_err(|err| ParseError::new(source, format!("JSON in __NEXT_DATA__ ({err})")))
}
