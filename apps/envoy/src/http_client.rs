use crate::{config::HttpConfig, errors::TransportError};
use reqwest::{
    Client, RequestBuilder, StatusCode,
    header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT},
};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

const DEFAULT_USER_AGENT: &str = "envoy governance notifier/1.0 reqwest/0.12";

/// Shared HTTP transport with bounded retries on 429, 5xx and connection errors.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    max_retries: usize,
    initial_backoff: Duration,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .default_headers(Self::default_headers())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff,
        })
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers
    }

    #[instrument(skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        self.execute(url, || self.client.get(url)).await
    }

    pub async fn get_json<T>(&self, url: &str) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let body = self.get_text(url).await?;
        decode(url, &body)
    }

    #[instrument(skip(self, body, headers))]
    pub async fn post_json<T, B>(
        &self,
        url: &str,
        body: &B,
        headers: HeaderMap,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let text = self
            .execute(url, || {
                self.client.post(url).headers(headers.clone()).json(body)
            })
            .await?;
        decode(url, &text)
    }

    async fn execute<F>(&self, url: &str, build: F) -> Result<String, TransportError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        let mut delay = self.initial_backoff;

        loop {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    match status {
                        status if status.is_success() => {
                            debug!(url, %status, "Request successful");
                            return response.text().await.map_err(|source| {
                                TransportError::Network {
                                    url: url.to_string(),
                                    source,
                                }
                            });
                        }
                        StatusCode::TOO_MANY_REQUESTS => {
                            attempt += 1;
                            if attempt > self.max_retries {
                                error!(url, attempt, "Max retries reached. Last error: HTTP 429");
                                return Err(TransportError::RetriesExhausted {
                                    url: url.to_string(),
                                    attempts: attempt,
                                    last_error: "HTTP 429".to_string(),
                                });
                            }

                            let retry_after = Self::get_retry_after(&response, delay);
                            warn!(url, attempt, retry_after = ?retry_after, "Rate limited, retrying");
                            sleep(retry_after).await;
                            delay = delay.max(retry_after) * 2;
                        }
                        status if status.is_server_error() => {
                            attempt += 1;
                            if attempt > self.max_retries {
                                error!(url, %status, attempt, "Max retries reached. Server error");
                                return Err(TransportError::RetriesExhausted {
                                    url: url.to_string(),
                                    attempts: attempt,
                                    last_error: format!("HTTP {status}"),
                                });
                            }

                            warn!(url, %status, attempt, delay = ?delay, "Server error, retrying");
                            sleep(delay).await;
                            delay *= 2;
                        }
                        status => {
                            let body = response.text().await.unwrap_or_default();
                            error!(url, %status, body, "Client error, skipping retries");
                            return Err(TransportError::Status {
                                url: url.to_string(),
                                status,
                                body,
                            });
                        }
                    }
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(url, error = ?e, attempt, "Max retries reached");
                        return Err(TransportError::Network {
                            url: url.to_string(),
                            source: e,
                        });
                    }
                    warn!(url, error = ?e, attempt, delay = ?delay, "Request error, retrying");
                    sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    fn get_retry_after(response: &reqwest::Response, default: Duration) -> Duration {
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(default)
    }
}

fn decode<T>(url: &str, body: &str) -> Result<T, TransportError>
where
    T: DeserializeOwned,
{
    serde_json::from_str(body).map_err(|source| TransportError::Decode {
        url: url.to_string(),
        source,
    })
}
