//! HTTP transport for the subscribe, heartbeat and leave endpoints.
//!
//! The subscribe loop only talks to the [`Transport`] trait, so tests can
//! script responses without a network. [`HttpTransport`] is the reqwest
//! implementation used by default.

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, warn};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::auth::AuthProvider;
use crate::error::{PulseLinkError, Result};
use crate::models::{HeartbeatRequest, LeaveRequest, PulseConfig, SubscribeRequest};
use crate::timeouts::{PulseTimeouts, SERVICE_HOLD_TIME};

/// Placeholder used in the channel path segment when only groups are given.
const EMPTY_CHANNEL_LIST: &str = ",";

/// Longest error body kept in a `ServerError` message.
const MAX_ERROR_BODY_LEN: usize = 512;

/// Executes the requests the subscribe loop and heartbeat worker need.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one long-poll call and return the raw response body.
    async fn subscribe(&self, request: &SubscribeRequest) -> Result<Bytes>;

    /// Announce presence for the given channels and groups.
    async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<()>;

    /// Tell the service this client left the given channels and groups.
    async fn leave(&self, request: &LeaveRequest) -> Result<()>;
}

/// reqwest-backed [`Transport`].
#[derive(Clone)]
pub struct HttpTransport {
    origin: Url,
    subscribe_key: String,
    user_id: String,
    http_client: reqwest::Client,
    auth: Arc<RwLock<AuthProvider>>,
    non_subscribe_timeout: Duration,
}

impl HttpTransport {
    /// Build a transport with a keep-alive connection pool.
    pub fn new(
        config: &PulseConfig,
        timeouts: &PulseTimeouts,
        auth: Arc<RwLock<AuthProvider>>,
    ) -> Result<Self> {
        let origin = Url::parse(&config.origin).map_err(|e| {
            PulseLinkError::ConfigurationError(format!("Invalid origin '{}': {}", config.origin, e))
        })?;

        let subscribe_timeout = timeouts.subscribe_request_timeout;
        if !PulseTimeouts::is_no_timeout(subscribe_timeout) && subscribe_timeout <= SERVICE_HOLD_TIME {
            warn!(
                "[pulse-link] subscribe_request_timeout {:?} does not exceed the service hold time {:?}; idle long-polls will time out",
                subscribe_timeout, SERVICE_HOLD_TIME
            );
        }

        // No client-wide timeout: the long-poll and the other calls set their own.
        let http_client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect_timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| PulseLinkError::ConfigurationError(e.to_string()))?;

        Ok(Self {
            origin,
            subscribe_key: config.subscribe_key.clone(),
            user_id: config.user_id.clone(),
            http_client,
            auth,
            non_subscribe_timeout: timeouts.non_subscribe_request_timeout,
        })
    }

    /// `/v2/subscribe/{sub_key}/{channels}/0`
    pub fn subscribe_url(&self, channels: &[String]) -> Result<Url> {
        let channels = channel_segment(channels);
        self.endpoint(&["v2", "subscribe", self.subscribe_key.as_str(), channels.as_str(), "0"])
    }

    /// `/v2/presence/sub-key/{sub_key}/channel/{channels}/{action}`
    pub fn presence_url(&self, channels: &[String], action: &str) -> Result<Url> {
        let channels = channel_segment(channels);
        self.endpoint(&[
            "v2",
            "presence",
            "sub-key",
            self.subscribe_key.as_str(),
            "channel",
            channels.as_str(),
            action,
        ])
    }

    /// Query parameters of a long-poll call.
    pub fn subscribe_query(&self, request: &SubscribeRequest) -> Result<Vec<(String, String)>> {
        let mut query = vec![("tt".to_string(), request.cursor.timestamp.to_string())];
        if !request.cursor.is_now() && request.cursor.region != 0 {
            query.push(("tr".to_string(), request.cursor.region.to_string()));
        }
        self.push_common(&mut query, &request.channel_groups, request.heartbeat_secs);
        if let Some(filter) = request.filter_expression.as_ref().filter(|f| !f.is_empty()) {
            query.push(("filter-expr".to_string(), filter.clone()));
        }
        if let Some(state) = &request.state {
            query.push(("state".to_string(), serde_json::to_string(state)?));
        }
        Ok(query)
    }

    fn push_common(
        &self,
        query: &mut Vec<(String, String)>,
        channel_groups: &[String],
        heartbeat_secs: Option<u64>,
    ) {
        if !channel_groups.is_empty() {
            query.push(("channel-group".to_string(), channel_groups.join(",")));
        }
        query.push(("uuid".to_string(), self.user_id.clone()));
        if let Some(heartbeat) = heartbeat_secs {
            query.push(("heartbeat".to_string(), heartbeat.to_string()));
        }
        self.auth.read().apply_to_query(query);
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.origin.clone();
        url.path_segments_mut()
            .map_err(|_| {
                PulseLinkError::ConfigurationError(format!(
                    "Origin '{}' cannot be a base URL",
                    self.origin
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET request with `timeout` applied unless it means "no timeout".
    fn request(
        &self,
        url: Url,
        query: &[(String, String)],
        timeout: Duration,
    ) -> reqwest::RequestBuilder {
        let request = self.http_client.get(url).query(query);
        if PulseTimeouts::is_no_timeout(timeout) {
            request
        } else {
            request.timeout(timeout)
        }
    }

    async fn get(&self, url: Url, query: Vec<(String, String)>, timeout: Duration) -> Result<Bytes> {
        let start = Instant::now();
        debug!("[pulse-link] GET {} (timeout={:?})", url.path(), timeout);

        let response = self.request(url.clone(), &query, timeout).send().await?;
        let status = response.status();
        let elapsed_ms = start.elapsed().as_millis();

        if status.is_success() {
            let body = response.bytes().await?;
            debug!(
                "[pulse-link] {} -> {} ({} bytes, {} ms)",
                url.path(),
                status,
                body.len(),
                elapsed_ms
            );
            return Ok(body);
        }

        let mut message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        if message.len() > MAX_ERROR_BODY_LEN {
            let mut cut = MAX_ERROR_BODY_LEN;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        warn!(
            "[pulse-link] Server error: status={} path={} duration_ms={}",
            status,
            url.path(),
            elapsed_ms
        );
        Err(PulseLinkError::ServerError {
            status_code: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn subscribe(&self, request: &SubscribeRequest) -> Result<Bytes> {
        let url = self.subscribe_url(&request.channels)?;
        let query = self.subscribe_query(request)?;
        self.get(url, query, request.timeout).await
    }

    async fn heartbeat(&self, request: &HeartbeatRequest) -> Result<()> {
        let url = self.presence_url(&request.channels, "heartbeat")?;
        let mut query = Vec::new();
        self.push_common(&mut query, &request.channel_groups, request.heartbeat_secs);
        if let Some(state) = &request.state {
            query.push(("state".to_string(), serde_json::to_string(state)?));
        }
        self.get(url, query, self.non_subscribe_timeout).await.map(|_| ())
    }

    async fn leave(&self, request: &LeaveRequest) -> Result<()> {
        let url = self.presence_url(&request.channels, "leave")?;
        let mut query = Vec::new();
        self.push_common(&mut query, &request.channel_groups, None);
        self.get(url, query, self.non_subscribe_timeout).await.map(|_| ())
    }
}

fn channel_segment(channels: &[String]) -> String {
    if channels.is_empty() {
        EMPTY_CHANNEL_LIST.to_string()
    } else {
        channels.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetoken::Timetoken;
    use serde_json::json;

    fn transport(auth: AuthProvider) -> HttpTransport {
        let config = PulseConfig::new("sub-key", "user 1").with_origin("https://edge.example/");
        HttpTransport::new(&config, &PulseTimeouts::default(), Arc::new(RwLock::new(auth))).unwrap()
    }

    fn request(cursor: Timetoken) -> SubscribeRequest {
        SubscribeRequest {
            channels: vec!["a".into(), "a-pnpres".into()],
            channel_groups: vec!["g1".into(), "g2".into()],
            cursor,
            heartbeat_secs: Some(300),
            filter_expression: Some("uuid != 'me'".into()),
            state: Some(json!({"a": {"x": 1}})),
            timeout: Duration::from_secs(310),
        }
    }

    fn value<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
        query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_subscribe_url_layout() {
        let t = transport(AuthProvider::none());
        assert_eq!(
            t.subscribe_url(&["a".into(), "b c".into()]).unwrap().as_str(),
            "https://edge.example/v2/subscribe/sub-key/a,b%20c/0"
        );
        assert_eq!(
            t.subscribe_url(&[]).unwrap().as_str(),
            "https://edge.example/v2/subscribe/sub-key/,/0"
        );
    }

    #[test]
    fn test_presence_url_layout() {
        let t = transport(AuthProvider::none());
        assert_eq!(
            t.presence_url(&["a".into()], "heartbeat").unwrap().as_str(),
            "https://edge.example/v2/presence/sub-key/sub-key/channel/a/heartbeat"
        );
    }

    #[test]
    fn test_subscribe_query_first_poll() {
        let t = transport(AuthProvider::none());
        let query = t.subscribe_query(&request(Timetoken::NOW)).unwrap();
        assert_eq!(value(&query, "tt"), Some("0"));
        assert_eq!(value(&query, "tr"), None);
        assert_eq!(value(&query, "channel-group"), Some("g1,g2"));
        assert_eq!(value(&query, "uuid"), Some("user 1"));
        assert_eq!(value(&query, "heartbeat"), Some("300"));
        assert_eq!(value(&query, "filter-expr"), Some("uuid != 'me'"));
        assert_eq!(value(&query, "state"), Some(r#"{"a":{"x":1}}"#));
        assert_eq!(value(&query, "auth"), None);
    }

    #[test]
    fn test_subscribe_query_resumes_with_region() {
        let t = transport(AuthProvider::token("tok"));
        let query = t.subscribe_query(&request(Timetoken::new(17000000000000000, 4))).unwrap();
        assert_eq!(value(&query, "tt"), Some("17000000000000000"));
        assert_eq!(value(&query, "tr"), Some("4"));
        assert_eq!(value(&query, "auth"), Some("tok"));
    }

    #[test]
    fn test_zero_timeout_is_not_applied() {
        let t = transport(AuthProvider::none());
        let url = t.subscribe_url(&["a".into()]).unwrap();

        let unbounded = t.request(url.clone(), &[], Duration::ZERO).build().unwrap();
        assert_eq!(unbounded.timeout(), None);

        let bounded = t.request(url, &[], Duration::from_secs(310)).build().unwrap();
        assert_eq!(bounded.timeout(), Some(&Duration::from_secs(310)));
    }

    #[test]
    fn test_token_swap_is_visible_to_transport() {
        let auth = Arc::new(RwLock::new(AuthProvider::auth_key("key")));
        let config = PulseConfig::new("sub-key", "u");
        let t = HttpTransport::new(&config, &PulseTimeouts::default(), auth.clone()).unwrap();
        auth.write().set_token(Some("fresh".into()));
        let query = t.subscribe_query(&request(Timetoken::NOW)).unwrap();
        assert_eq!(value(&query, "auth"), Some("fresh"));
    }
}
