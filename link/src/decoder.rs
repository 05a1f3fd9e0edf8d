//! Event decoder: turns a long-poll response into typed events.
//!
//! Decoding happens in two stages. [`decode_envelope`] parses the outer
//! envelope; failing there is batch-fatal and the subscribe loop treats it like
//! any other failed long-poll. [`EventDecoder::decode_batch`] then converts each
//! item on its own, so a bad item becomes a
//! [`SubscribeEvent::DecodeFailure`] in its slot and the remaining items are
//! still delivered in order.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::crypto::{decrypt_payload, CryptoModule};
use crate::error::{PulseLinkError, Result};
use crate::models::{
    DecodeFailureEvent, EnvelopeItem, EnvelopeItemType, FileEvent, MessageActionChange,
    MessageActionEvent, MessageEvent, ObjectsAction, ObjectsEvent, ObjectsEventKind,
    PresenceAction, PresenceEvent, SubscribeEnvelope, SubscribeEvent,
};
use crate::subscription_set::{is_presence_name, strip_presence_suffix};
use crate::timetoken::Timetoken;

/// Parse a raw long-poll body.
pub fn decode_envelope(body: &[u8]) -> Result<SubscribeEnvelope> {
    serde_json::from_slice(body)
        .map_err(|e| PulseLinkError::DecodeError(format!("Malformed subscribe envelope: {}", e)))
}

#[derive(Deserialize)]
struct PresencePayload {
    action: PresenceAction,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    occupancy: Option<u64>,
    #[serde(default)]
    timestamp: Option<u64>,
    #[serde(default)]
    data: Option<JsonValue>,
    #[serde(default)]
    join: Vec<String>,
    #[serde(default)]
    leave: Vec<String>,
    #[serde(default)]
    timeout: Vec<String>,
    #[serde(default)]
    here_now_refresh: bool,
}

#[derive(Deserialize)]
struct ObjectsPayload {
    event: ObjectsAction,
    #[serde(rename = "type")]
    kind: ObjectsEventKind,
    #[serde(default)]
    data: JsonValue,
}

#[derive(Deserialize)]
struct MessageActionPayload {
    event: MessageActionChange,
    data: MessageActionData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageActionData {
    #[serde(rename = "type")]
    action_type: String,
    value: String,
    #[serde(with = "crate::timetoken::ticks")]
    message_timetoken: u64,
    #[serde(with = "crate::timetoken::ticks")]
    action_timetoken: u64,
}

#[derive(Deserialize)]
struct FilePayload {
    #[serde(default)]
    message: Option<JsonValue>,
    file: FileInfo,
}

#[derive(Deserialize)]
struct FileInfo {
    id: String,
    name: String,
}

/// Converts envelope items into [`SubscribeEvent`]s.
#[derive(Clone)]
pub struct EventDecoder {
    origin: String,
    subscribe_key: String,
    crypto: Option<Arc<dyn CryptoModule>>,
}

impl std::fmt::Debug for EventDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDecoder")
            .field("origin", &self.origin)
            .field("subscribe_key", &self.subscribe_key)
            .field("crypto", &self.crypto.is_some())
            .finish()
    }
}

impl EventDecoder {
    /// `origin` and `subscribe_key` are only used to build file download URLs.
    pub fn new(origin: impl Into<String>, subscribe_key: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            subscribe_key: subscribe_key.into(),
            crypto: None,
        }
    }

    /// Decrypt message and file payloads with `crypto`.
    pub fn with_crypto(mut self, crypto: Option<Arc<dyn CryptoModule>>) -> Self {
        self.crypto = crypto;
        self
    }

    /// Decode every item of the batch, preserving order.
    pub fn decode_batch(&self, envelope: &SubscribeEnvelope) -> Vec<SubscribeEvent> {
        envelope.messages.iter().map(|raw| self.decode_item(raw)).collect()
    }

    /// Decode one raw item; failures are returned as a decode-failure event.
    pub fn decode_item(&self, raw: &JsonValue) -> SubscribeEvent {
        let item: EnvelopeItem = match serde_json::from_value(raw.clone()) {
            Ok(item) => item,
            Err(e) => {
                log::warn!("[pulse-link] Skipping malformed envelope item: {}", e);
                return SubscribeEvent::DecodeFailure(DecodeFailureEvent {
                    channel: raw.get("c").and_then(JsonValue::as_str).map(String::from),
                    timetoken: None,
                    reason: format!("Malformed item: {}", e),
                    raw: raw.clone(),
                });
            },
        };

        match self.decode_envelope_item(&item) {
            Ok(event) => event,
            Err(e) => {
                log::warn!(
                    "[pulse-link] Failed to decode item on '{}' at {}: {}",
                    item.channel,
                    item.publish_timetoken,
                    e
                );
                SubscribeEvent::DecodeFailure(DecodeFailureEvent {
                    channel: Some(item.channel.clone()),
                    timetoken: Some(item.publish_timetoken),
                    reason: e.to_string(),
                    raw: raw.clone(),
                })
            },
        }
    }

    fn decode_envelope_item(&self, item: &EnvelopeItem) -> Result<SubscribeEvent> {
        if is_presence_name(&item.channel) {
            return self.decode_presence(item);
        }

        let item_type = EnvelopeItemType::from_code(item.message_type).ok_or_else(|| {
            PulseLinkError::DecodeError(format!("Unknown item type {:?}", item.message_type))
        })?;

        match item_type {
            EnvelopeItemType::Message => Ok(SubscribeEvent::Message(MessageEvent {
                payload: self.decrypt(&item.payload)?,
                ..message_event(item)
            })),
            EnvelopeItemType::Signal => Ok(SubscribeEvent::Signal(message_event(item))),
            EnvelopeItemType::Objects => {
                let payload: ObjectsPayload = serde_json::from_value(item.payload.clone())?;
                Ok(SubscribeEvent::Objects(ObjectsEvent {
                    kind: payload.kind,
                    action: payload.event,
                    channel: item.channel.clone(),
                    subscription: item.subscription(),
                    timetoken: item.publish_timetoken,
                    data: payload.data,
                }))
            },
            EnvelopeItemType::MessageAction => {
                let payload: MessageActionPayload = serde_json::from_value(item.payload.clone())?;
                Ok(SubscribeEvent::MessageAction(MessageActionEvent {
                    change: payload.event,
                    channel: item.channel.clone(),
                    subscription: item.subscription(),
                    publisher: item.publisher.clone(),
                    timetoken: item.publish_timetoken,
                    action_type: payload.data.action_type,
                    value: payload.data.value,
                    message_timetoken: Timetoken::from_timestamp(payload.data.message_timetoken),
                    action_timetoken: Timetoken::from_timestamp(payload.data.action_timetoken),
                }))
            },
            EnvelopeItemType::File => self.decode_file(item),
        }
    }

    fn decode_presence(&self, item: &EnvelopeItem) -> Result<SubscribeEvent> {
        let payload: PresencePayload = serde_json::from_value(item.payload.clone())?;
        let channel = strip_presence_suffix(&item.channel).to_string();
        let subscription = item
            .subscription_match
            .as_deref()
            .map(strip_presence_suffix)
            .filter(|name| *name != channel)
            .map(String::from);

        Ok(SubscribeEvent::Presence(PresenceEvent {
            action: payload.action,
            channel,
            subscription,
            uuid: payload.uuid,
            occupancy: payload.occupancy,
            timestamp: payload.timestamp,
            state: payload.data,
            join: payload.join,
            leave: payload.leave,
            timeout: payload.timeout,
            here_now_refresh: payload.here_now_refresh,
            timetoken: item.publish_timetoken,
        }))
    }

    fn decode_file(&self, item: &EnvelopeItem) -> Result<SubscribeEvent> {
        let payload: FilePayload = serde_json::from_value(self.decrypt(&item.payload)?)?;
        let file_url = self.file_url(&item.channel, &payload.file.id, &payload.file.name)?;
        Ok(SubscribeEvent::File(FileEvent {
            channel: item.channel.clone(),
            subscription: item.subscription(),
            publisher: item.publisher.clone(),
            timetoken: item.publish_timetoken,
            message: payload.message,
            file_id: payload.file.id,
            file_name: payload.file.name,
            file_url,
        }))
    }

    fn decrypt(&self, payload: &JsonValue) -> Result<JsonValue> {
        match &self.crypto {
            Some(crypto) => decrypt_payload(crypto.as_ref(), payload),
            None => Ok(payload.clone()),
        }
    }

    fn file_url(&self, channel: &str, id: &str, name: &str) -> Result<String> {
        let mut url = url::Url::parse(&self.origin).map_err(|e| {
            PulseLinkError::ConfigurationError(format!("Invalid origin '{}': {}", self.origin, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                PulseLinkError::ConfigurationError(format!(
                    "Origin '{}' cannot be a base URL",
                    self.origin
                ))
            })?
            .pop_if_empty()
            .extend(["v1", "files", self.subscribe_key.as_str(), "channels", channel, "files", id, name]);
        Ok(url.to_string())
    }
}

fn message_event(item: &EnvelopeItem) -> MessageEvent {
    MessageEvent {
        channel: item.channel.clone(),
        subscription: item.subscription(),
        publisher: item.publisher.clone(),
        timetoken: item.publish_timetoken,
        payload: item.payload.clone(),
        user_metadata: item.user_metadata.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encrypt_payload;
    use crate::crypto::tests::XorCrypto;
    use serde_json::json;

    fn decoder() -> EventDecoder {
        EventDecoder::new("https://ps.pulse.example", "sub-key")
    }

    fn item(channel: &str, tt: u64, e: Option<u8>, d: JsonValue) -> JsonValue {
        let mut item = json!({
            "c": channel,
            "p": {"t": tt.to_string(), "r": 1},
            "i": "publisher",
            "d": d,
        });
        if let Some(e) = e {
            item["e"] = json!(e);
        }
        item
    }

    fn envelope(items: Vec<JsonValue>) -> SubscribeEnvelope {
        SubscribeEnvelope {
            cursor: Timetoken::new(100, 1),
            messages: items,
        }
    }

    #[test]
    fn test_malformed_envelope_is_decode_error() {
        let err = decode_envelope(b"{\"m\": []").unwrap_err();
        assert!(matches!(err, PulseLinkError::DecodeError(_)));

        let err = decode_envelope(br#"{"m": []}"#).unwrap_err();
        assert!(matches!(err, PulseLinkError::DecodeError(_)), "cursor is mandatory");
    }

    #[test]
    fn test_batch_preserves_order_and_kinds() {
        let batch = envelope(vec![
            item("ch1", 1, None, json!({"text": "first"})),
            item("ch2-pnpres", 2, None, json!({"action": "join", "uuid": "bob", "occupancy": 2})),
            item("ch2", 3, Some(0), json!("second")),
            item("ch1", 4, Some(1), json!("typing")),
        ]);
        let events = decoder().decode_batch(&batch);
        let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["message", "presence", "message", "signal"]);
        let timetokens: Vec<u64> = events.iter().filter_map(|e| e.timetoken()).map(|t| t.timestamp).collect();
        assert_eq!(timetokens, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_presence_strips_suffix() {
        let mut raw = item(
            "room-pnpres",
            7,
            None,
            json!({"action": "state-change", "uuid": "ann", "timestamp": 1700000000, "data": {"mood": "ok"}}),
        );
        raw["b"] = json!("rooms-pnpres");
        match decoder().decode_item(&raw) {
            SubscribeEvent::Presence(presence) => {
                assert_eq!(presence.channel, "room");
                assert_eq!(presence.subscription.as_deref(), Some("rooms"));
                assert_eq!(presence.action, PresenceAction::StateChange);
                assert_eq!(presence.state, Some(json!({"mood": "ok"})));
            },
            other => panic!("expected presence, got {:?}", other),
        }
    }

    #[test]
    fn test_presence_interval() {
        let raw = item(
            "room-pnpres",
            7,
            None,
            json!({"action": "interval", "occupancy": 40, "join": ["a", "b"], "timeout": ["c"], "here_now_refresh": true}),
        );
        match decoder().decode_item(&raw) {
            SubscribeEvent::Presence(presence) => {
                assert_eq!(presence.action, PresenceAction::Interval);
                assert_eq!(presence.join, vec!["a", "b"]);
                assert_eq!(presence.timeout, vec!["c"]);
                assert!(presence.leave.is_empty());
                assert!(presence.here_now_refresh);
            },
            other => panic!("expected presence, got {:?}", other),
        }
    }

    #[test]
    fn test_objects_event() {
        let raw = item(
            "team",
            5,
            Some(2),
            json!({"source": "objects", "version": "2.0", "event": "delete", "type": "membership", "data": {"uuid": {"id": "u"}}}),
        );
        match decoder().decode_item(&raw) {
            SubscribeEvent::Objects(objects) => {
                assert_eq!(objects.kind, ObjectsEventKind::Membership);
                assert_eq!(objects.action, ObjectsAction::Delete);
                assert_eq!(objects.data["uuid"]["id"], "u");
            },
            other => panic!("expected objects, got {:?}", other),
        }
    }

    #[test]
    fn test_message_action_event() {
        let raw = item(
            "chat",
            5,
            Some(3),
            json!({
                "source": "actions",
                "version": "1.0",
                "event": "added",
                "data": {"type": "reaction", "value": "smile", "messageTimetoken": "16", "actionTimetoken": "17"}
            }),
        );
        match decoder().decode_item(&raw) {
            SubscribeEvent::MessageAction(action) => {
                assert_eq!(action.change, MessageActionChange::Added);
                assert_eq!(action.action_type, "reaction");
                assert_eq!(action.message_timetoken, Timetoken::from_timestamp(16));
                assert_eq!(action.action_timetoken, Timetoken::from_timestamp(17));
            },
            other => panic!("expected message action, got {:?}", other),
        }
    }

    #[test]
    fn test_file_event_builds_download_url() {
        let raw = item(
            "my channel",
            5,
            Some(4),
            json!({"message": {"caption": "cat"}, "file": {"id": "f-1", "name": "cat pic.png"}}),
        );
        match decoder().decode_item(&raw) {
            SubscribeEvent::File(file) => {
                assert_eq!(file.file_id, "f-1");
                assert_eq!(
                    file.file_url,
                    "https://ps.pulse.example/v1/files/sub-key/channels/my%20channel/files/f-1/cat%20pic.png"
                );
                assert_eq!(file.message, Some(json!({"caption": "cat"})));
            },
            other => panic!("expected file, got {:?}", other),
        }
    }

    #[test]
    fn test_encrypted_message_is_decrypted() {
        let crypto = Arc::new(XorCrypto(0x33));
        let secret = encrypt_payload(crypto.as_ref(), &json!({"text": "hidden"})).unwrap();
        let decoder = decoder().with_crypto(Some(crypto));
        match decoder.decode_item(&item("ch", 1, None, secret)) {
            SubscribeEvent::Message(message) => assert_eq!(message.payload, json!({"text": "hidden"})),
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_item_does_not_fail_batch() {
        let decoder = decoder().with_crypto(Some(Arc::new(XorCrypto(1))));
        let batch = envelope(vec![
            item("ch", 1, None, json!(42)),
            item("ch", 2, None, json!("%%% not base64")),
            json!({"p": {"t": "3"}}),
            item("ch", 4, Some(77), json!(1)),
            item("ch", 5, None, json!({"ok": true})),
        ]);
        let events = decoder.decode_batch(&batch);
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], SubscribeEvent::Message(_)));
        match &events[1] {
            SubscribeEvent::DecodeFailure(failure) => {
                assert_eq!(failure.channel.as_deref(), Some("ch"));
                assert_eq!(failure.timetoken, Some(Timetoken::new(2, 1)));
            },
            other => panic!("expected decode failure, got {:?}", other),
        }
        assert!(matches!(events[2], SubscribeEvent::DecodeFailure(_)));
        assert!(matches!(events[3], SubscribeEvent::DecodeFailure(_)));
        assert!(matches!(events[4], SubscribeEvent::Message(_)));
    }

    #[test]
    fn test_signals_are_not_decrypted() {
        let decoder = decoder().with_crypto(Some(Arc::new(XorCrypto(1))));
        match decoder.decode_item(&item("ch", 1, Some(1), json!("plain"))) {
            SubscribeEvent::Signal(signal) => assert_eq!(signal.payload, json!("plain")),
            other => panic!("expected signal, got {:?}", other),
        }
    }
}
