//! Main pulse-link client with builder pattern.
//!
//! Provides the public subscribe/unsubscribe/listener operations and owns the
//! background subscribe loop and heartbeat worker.

use crate::{
    auth::AuthProvider,
    connection::{
        spawn_heartbeat, HeartbeatSettings, LoopSettings, LoopState, SubscribeLoopHandle,
    },
    crypto::CryptoModule,
    decoder::EventDecoder,
    error::{PulseLinkError, Result},
    listener::{Listener, ListenerEvents, ListenerRegistry},
    models::{PulseConfig, SubscribeOptions, UnsubscribeOptions},
    timeouts::PulseTimeouts,
    timetoken::Timetoken,
    transport::{HttpTransport, Transport},
};
use parking_lot::RwLock;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Main pulse-link client.
///
/// Use [`PulseClientBuilder`] to construct instances. Building spawns the
/// subscribe loop (and the heartbeat worker, unless disabled) on the current
/// tokio runtime. Clones share the same loop; it shuts down when
/// [`destroy`](PulseClient::destroy) is called or the last clone is dropped.
///
/// # Examples
///
/// ```rust,no_run
/// use pulse_link::{Listener, ListenerEvent, PulseClient, PulseConfig, SubscribeOptions};
///
/// # async fn example() -> pulse_link::Result<()> {
/// let client = PulseClient::builder()
///     .config(PulseConfig::new("sub-c-demo", "device-42"))
///     .token("access-token")
///     .build()?;
///
/// let (listener, mut events) = Listener::new();
/// client.add_listener(&listener);
/// client
///     .subscribe(SubscribeOptions::new().with_channels(["chat"]).with_presence(true))
///     .await?;
///
/// while let Some(item) = events.recv().await {
///     match item {
///         ListenerEvent::Status(status) => println!("status: {:?}", status.category),
///         ListenerEvent::Event(event) => println!("{} on {:?}", event.kind(), event.channel()),
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PulseClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: PulseConfig,
    timeouts: PulseTimeouts,
    auth: Arc<RwLock<AuthProvider>>,
    listeners: Arc<ListenerRegistry>,
    subscribe_loop: SubscribeLoopHandle,
    heartbeat: Option<JoinHandle<()>>,
    destroyed: AtomicBool,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.abort();
        }
    }
}

impl std::fmt::Debug for PulseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseClient")
            .field("subscribe_key", &self.inner.config.subscribe_key)
            .field("user_id", &self.inner.config.user_id)
            .field("state", &self.state())
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

impl PulseClient {
    /// Create a new builder for configuring the client
    pub fn builder() -> PulseClientBuilder {
        PulseClientBuilder::new()
    }

    /// Add channels and/or groups to the subscription.
    ///
    /// Fails fast with [`PulseLinkError::ValidationError`] when no channel or
    /// group is given. Otherwise the call returns once the loop has applied
    /// the change; connection progress is reported to listeners.
    pub async fn subscribe(&self, options: SubscribeOptions) -> Result<()> {
        self.ensure_alive()?;
        options.validate()?;
        log::debug!(
            "[pulse-link] subscribe channels={:?} groups={:?} presence={}",
            options.channels,
            options.channel_groups,
            options.with_presence
        );
        self.inner.subscribe_loop.subscribe(options).await
    }

    /// Remove channels and/or groups. Names not subscribed are ignored.
    pub async fn unsubscribe(&self, options: UnsubscribeOptions) -> Result<()> {
        self.ensure_alive()?;
        options.validate()?;
        self.inner.subscribe_loop.unsubscribe(options).await
    }

    /// Remove everything and stop polling.
    pub async fn unsubscribe_all(&self) -> Result<()> {
        self.ensure_alive()?;
        self.inner.subscribe_loop.unsubscribe_all().await
    }

    /// Create and register a listener whose mailbox holds
    /// `listener_queue_capacity` items.
    pub fn listener(&self) -> (Listener, ListenerEvents) {
        let (listener, events) = Listener::with_capacity(self.inner.config.listener_queue_capacity);
        self.inner.listeners.add(&listener);
        (listener, events)
    }

    /// Register a listener; returns false if it was already registered.
    pub fn add_listener(&self, listener: &Listener) -> bool {
        self.inner.listeners.add(listener)
    }

    /// Unregister a listener; nothing is delivered to it once this returns.
    pub fn remove_listener(&self, listener: &Listener) -> bool {
        self.inner.listeners.remove(listener)
    }

    /// Stop the subscribe loop and heartbeat worker and drop all listeners.
    ///
    /// Listeners receive a final `Disconnected` status when something was
    /// subscribed. Every later operation fails with
    /// [`PulseLinkError::ClientDestroyed`]. Calling `destroy` twice is a no-op.
    pub async fn destroy(&self) -> Result<()> {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(heartbeat) = &self.inner.heartbeat {
            heartbeat.abort();
        }
        match self.inner.subscribe_loop.shutdown().await {
            Ok(()) | Err(PulseLinkError::ClientDestroyed) => {},
            Err(e) => return Err(e),
        }
        self.inner.listeners.clear();
        log::info!("[pulse-link] Client destroyed");
        Ok(())
    }

    /// Replace the access token used by all subsequent requests.
    pub fn set_token(&self, token: Option<String>) {
        self.inner.auth.write().set_token(token);
    }

    /// Channels currently subscribed (without presence companions).
    pub fn subscribed_channels(&self) -> Vec<String> {
        self.inner.subscribe_loop.snapshot().channels
    }

    /// Channel groups currently subscribed.
    pub fn subscribed_channel_groups(&self) -> Vec<String> {
        self.inner.subscribe_loop.snapshot().channel_groups
    }

    /// Current state of the subscribe loop.
    pub fn state(&self) -> LoopState {
        self.inner.subscribe_loop.state()
    }

    /// Receiver that observes every loop state change.
    pub fn watch_state(&self) -> watch::Receiver<LoopState> {
        self.inner.subscribe_loop.state_receiver()
    }

    /// Cursor the next long-poll resumes from.
    pub fn current_timetoken(&self) -> Timetoken {
        self.inner.subscribe_loop.cursor()
    }

    pub fn config(&self) -> &PulseConfig {
        &self.inner.config
    }

    pub fn timeouts(&self) -> &PulseTimeouts {
        &self.inner.timeouts
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(PulseLinkError::ClientDestroyed);
        }
        Ok(())
    }
}

/// Builder for configuring [`PulseClient`] instances.
pub struct PulseClientBuilder {
    config: Option<PulseConfig>,
    timeouts: PulseTimeouts,
    auth: AuthProvider,
    crypto: Option<Arc<dyn CryptoModule>>,
    transport: Option<Arc<dyn Transport>>,
}

impl PulseClientBuilder {
    fn new() -> Self {
        Self {
            config: None,
            timeouts: PulseTimeouts::default(),
            auth: AuthProvider::none(),
            crypto: None,
            transport: None,
        }
    }

    /// Set the client configuration (required)
    pub fn config(mut self, config: PulseConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set custom timeout configuration
    pub fn timeouts(mut self, timeouts: PulseTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Authenticate with a legacy auth key
    pub fn auth_key(mut self, key: impl Into<String>) -> Self {
        self.auth = AuthProvider::auth_key(key);
        self
    }

    /// Authenticate with an access token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthProvider::token(token);
        self
    }

    /// Set the authentication provider
    pub fn auth(mut self, auth: AuthProvider) -> Self {
        self.auth = auth;
        self
    }

    /// Decrypt message and file payloads with this module
    pub fn crypto_module(mut self, crypto: Arc<dyn CryptoModule>) -> Self {
        self.crypto = Some(crypto);
        self
    }

    /// Replace the HTTP transport (tests, proxies, custom stacks)
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client. Must be called from within a tokio runtime.
    pub fn build(self) -> Result<PulseClient> {
        let config = self
            .config
            .ok_or_else(|| PulseLinkError::ConfigurationError("config is required".into()))?;
        config.validate()?;

        let auth = Arc::new(RwLock::new(self.auth));
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&config, &self.timeouts, auth.clone())?),
        };
        let decoder =
            EventDecoder::new(&config.origin, &config.subscribe_key).with_crypto(self.crypto);
        let listeners = Arc::new(ListenerRegistry::new());

        let subscribe_loop = SubscribeLoopHandle::spawn(
            transport.clone(),
            decoder,
            listeners.clone(),
            LoopSettings::from_config(&config, &self.timeouts),
        );

        let heartbeat = config.heartbeat_interval().map(|interval| {
            spawn_heartbeat(
                transport,
                listeners.clone(),
                subscribe_loop.state_receiver(),
                subscribe_loop.snapshot_receiver(),
                HeartbeatSettings {
                    interval,
                    heartbeat_secs: config.presence_timeout_secs,
                    notifications: config.heartbeat_notifications,
                },
            )
        });

        log::info!(
            "[pulse-link] Client ready: origin={} user_id={} heartbeat={}",
            config.origin,
            config.user_id,
            heartbeat.is_some()
        );

        Ok(PulseClient {
            inner: Arc::new(ClientInner {
                config,
                timeouts: self.timeouts,
                auth,
                listeners,
                subscribe_loop,
                heartbeat,
                destroyed: AtomicBool::new(false),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PulseConfig {
        PulseConfig::new("sub-key", "user").with_heartbeat_interval_secs(0)
    }

    #[test]
    fn test_builder_missing_config() {
        let result = PulseClient::builder().build();
        assert!(matches!(result, Err(PulseLinkError::ConfigurationError(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = PulseClient::builder().config(PulseConfig::new("", "user")).build();
        assert!(matches!(result, Err(PulseLinkError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_subscribe_without_names_fails_fast() {
        let client = PulseClient::builder().config(config()).build().unwrap();
        let err = client.subscribe(SubscribeOptions::new()).await.unwrap_err();
        assert!(matches!(err, PulseLinkError::ValidationError(_)));
        assert_eq!(client.state(), LoopState::Idle);
    }

    #[tokio::test]
    async fn test_operations_after_destroy() {
        let client = PulseClient::builder().config(config()).token("t").build().unwrap();
        client.destroy().await.unwrap();
        client.destroy().await.unwrap();
        assert!(client.is_destroyed());

        let err = client
            .subscribe(SubscribeOptions::new().with_channels(["a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PulseLinkError::ClientDestroyed));
        assert!(matches!(client.unsubscribe_all().await, Err(PulseLinkError::ClientDestroyed)));
    }

    #[tokio::test]
    async fn test_introspection_defaults() {
        let client = PulseClient::builder().config(config()).build().unwrap();
        assert!(client.subscribed_channels().is_empty());
        assert!(client.subscribed_channel_groups().is_empty());
        assert_eq!(client.current_timetoken(), Timetoken::NOW);
        assert_eq!(client.config().subscribe_key, "sub-key");
        client.set_token(Some("rotated".into()));
    }

    #[tokio::test]
    async fn test_listener_helper_registers() {
        let client = PulseClient::builder()
            .config(config().with_listener_queue_capacity(4))
            .build()
            .unwrap();
        let (listener, _events) = client.listener();
        assert!(!client.add_listener(&listener));
        assert!(client.remove_listener(&listener));
        assert!(!client.remove_listener(&listener));
    }
}
