use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::error::{PulseLinkError, Result};
use crate::timetoken::Timetoken;

/// Arguments of [`PulseClient::subscribe`](crate::PulseClient::subscribe).
///
/// # Example
///
/// ```rust
/// use pulse_link::SubscribeOptions;
/// use serde_json::json;
///
/// let options = SubscribeOptions::new()
///     .with_channels(["chat", "alerts"])
///     .with_channel_groups(["rooms"])
///     .with_presence(true)
///     .with_state("chat", json!({"mood": "curious"}));
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscribeOptions {
    pub channels: Vec<String>,
    pub channel_groups: Vec<String>,

    /// Also receive presence events (`<name>-pnpres`)
    pub with_presence: bool,

    /// Resume from this position instead of the current cursor
    pub timetoken: Option<Timetoken>,

    /// Presence state per channel
    pub state: BTreeMap<String, JsonValue>,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels.extend(channels.into_iter().map(Into::into));
        self
    }

    pub fn with_channel_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channel_groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn with_presence(mut self, enabled: bool) -> Self {
        self.with_presence = enabled;
        self
    }

    /// Override the cursor; an explicit value may move it backwards.
    pub fn with_timetoken(mut self, timetoken: impl Into<Timetoken>) -> Self {
        self.timetoken = Some(timetoken.into());
        self
    }

    pub fn with_state(mut self, channel: impl Into<String>, state: JsonValue) -> Self {
        self.state.insert(channel.into(), state);
        self
    }

    /// Reject calls that name nothing to subscribe to.
    pub fn validate(&self) -> Result<()> {
        validate_names(&self.channels, &self.channel_groups)?;
        if let Some(channel) = self.state.keys().find(|c| !self.channels.contains(c)) {
            return Err(PulseLinkError::ValidationError(format!(
                "State given for channel '{}' which is not part of this subscribe call",
                channel
            )));
        }
        Ok(())
    }
}

/// Arguments of [`PulseClient::unsubscribe`](crate::PulseClient::unsubscribe).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnsubscribeOptions {
    pub channels: Vec<String>,
    pub channel_groups: Vec<String>,
}

impl UnsubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels.extend(channels.into_iter().map(Into::into));
        self
    }

    pub fn with_channel_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channel_groups.extend(groups.into_iter().map(Into::into));
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_names(&self.channels, &self.channel_groups)
    }
}

fn validate_names(channels: &[String], channel_groups: &[String]) -> Result<()> {
    if channels.is_empty() && channel_groups.is_empty() {
        return Err(PulseLinkError::ValidationError(
            "At least one channel or channel group is required".to_string(),
        ));
    }
    if let Some(name) = channels.iter().chain(channel_groups).find(|n| n.trim().is_empty()) {
        return Err(PulseLinkError::ValidationError(format!(
            "Channel and group names must not be blank (got '{}')",
            name
        )));
    }
    Ok(())
}
