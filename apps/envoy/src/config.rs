use crate::{
    classifier::Windows,
    models::tally::{ARBITRUM_CHAIN_ID, ARBITRUM_GOVERNORS},
};
use std::{env, str::FromStr, time::Duration};
use tracing::{info, warn};

/// Upper bound for the classifier windows (100 years).
const MAX_WINDOW_HOURS: i64 = 100 * 365 * 24;

#[derive(Debug, Clone)]
pub struct EnvoyConfig {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub windows: Windows,
    pub schedule: ScheduleConfig,
    pub timeouts: TimeoutConfig,
    pub http: HttpConfig,
    pub sources: SourcesConfig,
    pub telegram: Option<TelegramConfig>,
    /// Also send each cycle's expiring partition, not only the periodic digest.
    pub notify_expiring_each_cycle: bool,
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub poll_interval: Duration,
    pub digest_interval: Duration,
    /// How long shutdown waits for an in-flight cycle.
    pub shutdown_grace: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60 * 60),
            digest_interval: Duration::from_secs(24 * 60 * 60),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub fetch: Duration,
    pub store: Duration,
    pub notify: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(120),
            store: Duration::from_secs(15),
            notify: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub max_retries: usize,
    pub initial_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourcesConfig {
    pub maker_base_url: String,
    pub aave_base_url: String,
    pub tally_api_url: String,
    pub tally_web_url: String,
    pub tally_api_key: Option<String>,
    pub arbitrum_chain_id: String,
    pub arbitrum_governors: Vec<String>,
    pub arbitrum_page_limit: u32,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            maker_base_url: "https://vote.makerdao.com".to_string(),
            aave_base_url: "https://app.aave.com".to_string(),
            tally_api_url: "https://api.tally.xyz/query".to_string(),
            tally_web_url: "https://www.tally.xyz".to_string(),
            tally_api_key: None,
            arbitrum_chain_id: ARBITRUM_CHAIN_ID.to_string(),
            arbitrum_governors: ARBITRUM_GOVERNORS.iter().map(|g| g.to_string()).collect(),
            arbitrum_page_limit: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_url: String,
    pub maker_chat_id: Option<String>,
    pub aave_chat_id: Option<String>,
    pub arbitrum_chat_id: Option<String>,
    pub diagnostics_chat_id: Option<String>,
}

impl Default for EnvoyConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
            database_url: None,
            windows: Windows::default(),
            schedule: ScheduleConfig::default(),
            timeouts: TimeoutConfig::default(),
            http: HttpConfig::default(),
            sources: SourcesConfig::default(),
            telegram: None,
            notify_expiring_each_cycle: false,
        }
    }
}

impl EnvoyConfig {
    /// Builds the configuration from the process environment (after `dotenv`).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Invalid values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = EnvoyConfig::default();

        if let Some(addr) = get("ENVOY_BIND_ADDR") {
            config.bind_addr = addr;
        } else if let Some(port) = get("PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.bind_addr = format!("0.0.0.0:{port}"),
                Err(err) => warn!(error = %err, value = %port, "Failed to parse PORT override"),
            }
        }

        config.database_url = get("DATABASE_URL");

        if let Some(window) = window_override(&get, "ENVOY_NEW_WINDOW_HOURS") {
            config.windows.new_window = window;
        }
        if let Some(window) = window_override(&get, "ENVOY_EXPIRY_WINDOW_HOURS") {
            config.windows.expiry_window = window;
        }

        if let Some(secs) = parse_override::<u64>(&get, "ENVOY_POLL_INTERVAL_SECS") {
            config.schedule.poll_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parse_override::<u64>(&get, "ENVOY_DIGEST_INTERVAL_SECS") {
            config.schedule.digest_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parse_override::<u64>(&get, "ENVOY_SHUTDOWN_GRACE_SECS") {
            config.schedule.shutdown_grace = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_override::<u64>(&get, "ENVOY_FETCH_TIMEOUT_SECS") {
            config.timeouts.fetch = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_override::<u64>(&get, "ENVOY_STORE_TIMEOUT_SECS") {
            config.timeouts.store = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_override::<u64>(&get, "ENVOY_NOTIFY_TIMEOUT_SECS") {
            config.timeouts.notify = Duration::from_secs(secs);
        }

        if let Some(retries) = parse_override::<usize>(&get, "ENVOY_HTTP_MAX_RETRIES") {
            config.http.max_retries = retries;
        }
        if let Some(secs) = parse_override::<u64>(&get, "ENVOY_HTTP_TIMEOUT_SECS") {
            config.http.request_timeout = Duration::from_secs(secs);
        }

        if let Some(enabled) = parse_override::<bool>(&get, "ENVOY_NOTIFY_EXPIRING_EACH_CYCLE") {
            config.notify_expiring_each_cycle = enabled;
        }

        let sources = &mut config.sources;
        if let Some(url) = get("MAKER_BASE_URL") {
            sources.maker_base_url = trim_base(url);
        }
        if let Some(url) = get("AAVE_BASE_URL") {
            sources.aave_base_url = trim_base(url);
        }
        if let Some(url) = get("TALLY_API_URL") {
            sources.tally_api_url = url;
        }
        if let Some(url) = get("TALLY_WEB_URL") {
            sources.tally_web_url = trim_base(url);
        }
        sources.tally_api_key = get("TALLY_API_KEY");
        if let Some(limit) = parse_override::<u32>(&get, "ARBITRUM_PAGE_LIMIT") {
            sources.arbitrum_page_limit = limit;
        }
        if let Some(governors) = get("ARBITRUM_GOVERNORS") {
            sources.arbitrum_governors = governors
                .split(',')
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect();
        }

        config.telegram = get("BOT_TOKEN").map(|bot_token| TelegramConfig {
            bot_token,
            api_url: get("TELEGRAM_API_URL")
                .map(trim_base)
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            maker_chat_id: get("MAKER_CHAT_ID"),
            aave_chat_id: get("AAVE_CHAT_ID"),
            arbitrum_chat_id: get("ARBITRUM_CHAT_ID"),
            diagnostics_chat_id: get("TEST_CHAT_ID"),
        });

        info!(
            bind_addr = %config.bind_addr,
            store = config.database_url.is_some(),
            telegram = config.telegram.is_some(),
            tally_api_key = config.sources.tally_api_key.is_some(),
            new_window_hours = config.windows.new_window.num_hours(),
            expiry_window_hours = config.windows.expiry_window.num_hours(),
            poll_interval_secs = config.schedule.poll_interval.as_secs(),
            "Envoy config loaded"
        );

        config
    }
}

fn parse_override<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = get(key)?;
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(error = %err, key, value = %value, "Failed to parse config override, keeping default");
            None
        }
    }
}

/// Classifier windows must be positive and small enough that `now ± window` stays representable.
fn window_override(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<chrono::Duration> {
    let hours = parse_override::<i64>(get, key)?;
    let window = (1..=MAX_WINDOW_HOURS)
        .contains(&hours)
        .then(|| chrono::Duration::try_hours(hours))
        .flatten();
    if window.is_none() {
        warn!(
            key,
            hours,
            max_hours = MAX_WINDOW_HOURS,
            "Window override out of range, keeping default"
        );
    }
    window
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
