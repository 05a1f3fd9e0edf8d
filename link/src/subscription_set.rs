//! The set of channels and channel groups the client is subscribed to.
//!
//! Owned exclusively by the subscribe loop; callers only ever submit
//! add/remove requests. Presence is a per-name flag: when set, the long-poll
//! also carries the implicit `<name>-pnpres` companion.

use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};

/// Suffix of the implicit presence companion channel/group.
pub const PRESENCE_SUFFIX: &str = "-pnpres";

/// Returns true for `<name>-pnpres` names.
pub fn is_presence_name(name: &str) -> bool {
    name.len() > PRESENCE_SUFFIX.len() && name.ends_with(PRESENCE_SUFFIX)
}

/// Strip the presence suffix, if present.
pub fn strip_presence_suffix(name: &str) -> &str {
    if is_presence_name(name) {
        &name[..name.len() - PRESENCE_SUFFIX.len()]
    } else {
        name
    }
}

/// Names whose membership actually changed in one add/remove call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDelta {
    /// Channels added or removed
    pub channels: Vec<String>,
    /// Channel groups added or removed
    pub channel_groups: Vec<String>,
}

impl SubscriptionDelta {
    /// True when the call was a no-op.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.channel_groups.is_empty()
    }
}

/// Channels, groups, presence flags and presence state of one client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionSet {
    channels: BTreeSet<String>,
    channel_groups: BTreeSet<String>,
    presence_channels: BTreeSet<String>,
    presence_groups: BTreeSet<String>,
    state: BTreeMap<String, JsonValue>,
}

impl SubscriptionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add channels and groups; `with_presence` also flags them for presence.
    /// Names that already end in `-pnpres` are stored as given and never
    /// flagged.
    ///
    /// Returns the names whose wire representation changed.
    pub fn add(
        &mut self,
        channels: &[String],
        channel_groups: &[String],
        with_presence: bool,
    ) -> SubscriptionDelta {
        let mut delta = SubscriptionDelta::default();
        for channel in channels {
            let mut changed = self.channels.insert(channel.clone());
            if with_presence && !is_presence_name(channel) {
                changed |= self.presence_channels.insert(channel.clone());
            }
            if changed {
                delta.channels.push(channel.clone());
            }
        }
        for group in channel_groups {
            let mut changed = self.channel_groups.insert(group.clone());
            if with_presence && !is_presence_name(group) {
                changed |= self.presence_groups.insert(group.clone());
            }
            if changed {
                delta.channel_groups.push(group.clone());
            }
        }
        delta
    }

    /// Remove channels and groups.
    ///
    /// A plain name drops the channel together with its presence flag and
    /// state. A `<name>-pnpres` name drops the presence flag of `<name>` and
    /// any literal `<name>-pnpres` entry added earlier. Names that are not
    /// subscribed are ignored.
    pub fn remove(&mut self, channels: &[String], channel_groups: &[String]) -> SubscriptionDelta {
        let mut delta = SubscriptionDelta::default();
        for channel in channels {
            let removed = if is_presence_name(channel) {
                let flag = self.presence_channels.remove(strip_presence_suffix(channel));
                let literal = self.channels.remove(channel);
                flag | literal
            } else {
                let was_present = self.channels.remove(channel);
                self.presence_channels.remove(channel);
                self.state.remove(channel);
                was_present
            };
            if removed {
                delta.channels.push(channel.clone());
            }
        }
        for group in channel_groups {
            let removed = if is_presence_name(group) {
                let flag = self.presence_groups.remove(strip_presence_suffix(group));
                let literal = self.channel_groups.remove(group);
                flag | literal
            } else {
                let was_present = self.channel_groups.remove(group);
                self.presence_groups.remove(group);
                was_present
            };
            if removed {
                delta.channel_groups.push(group.clone());
            }
        }
        delta
    }

    /// Remove everything, returning what was subscribed.
    pub fn clear(&mut self) -> SubscriptionDelta {
        let delta = SubscriptionDelta {
            channels: self.channels.iter().cloned().collect(),
            channel_groups: self.channel_groups.iter().cloned().collect(),
        };
        *self = Self::default();
        delta
    }

    /// Attach presence state to a subscribed channel (ignored otherwise).
    pub fn set_state(&mut self, channel: &str, state: JsonValue) -> bool {
        if self.channels.contains(channel) {
            self.state.insert(channel.to_string(), state);
            true
        } else {
            false
        }
    }

    /// No channels and no groups.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.channel_groups.is_empty()
    }

    /// Whether `channel` is subscribed.
    pub fn contains_channel(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }

    /// Whether `group` is subscribed.
    pub fn contains_group(&self, group: &str) -> bool {
        self.channel_groups.contains(group)
    }

    /// Subscribed channel names (without presence companions), sorted.
    pub fn channels(&self) -> Vec<String> {
        self.channels.iter().cloned().collect()
    }

    /// Subscribed channel group names (without presence companions), sorted.
    pub fn channel_groups(&self) -> Vec<String> {
        self.channel_groups.iter().cloned().collect()
    }

    /// Channels carrying the presence flag, sorted.
    pub fn presence_channels(&self) -> Vec<String> {
        self.presence_channels.iter().cloned().collect()
    }

    /// Channel list for the wire: channels plus `-pnpres` companions.
    pub fn wire_channels(&self) -> Vec<String> {
        expand_presence(&self.channels, &self.presence_channels)
    }

    /// Channel group list for the wire: groups plus `-pnpres` companions.
    pub fn wire_channel_groups(&self) -> Vec<String> {
        expand_presence(&self.channel_groups, &self.presence_groups)
    }

    /// Presence state as a `{channel: state}` object, or `None` when unset.
    pub fn state_json(&self) -> Option<JsonValue> {
        if self.state.is_empty() {
            return None;
        }
        let map: JsonMap<String, JsonValue> = self
            .state
            .iter()
            .map(|(channel, state)| (channel.clone(), state.clone()))
            .collect();
        Some(JsonValue::Object(map))
    }
}

/// Sorted and deduplicated: a literal `x-pnpres` entry and the flag on `x`
/// put the same name on the wire once.
fn expand_presence(names: &BTreeSet<String>, presence: &BTreeSet<String>) -> Vec<String> {
    let mut wire: BTreeSet<String> = names.clone();
    wire.extend(
        presence
            .iter()
            .filter(|name| names.contains(*name))
            .map(|name| format!("{}{}", name, PRESENCE_SUFFIX)),
    );
    wire.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_reports_only_new_names() {
        let mut set = SubscriptionSet::new();
        let delta = set.add(&names(&["a", "b"]), &names(&["g"]), false);
        assert_eq!(delta.channels, names(&["a", "b"]));
        assert_eq!(delta.channel_groups, names(&["g"]));

        let delta = set.add(&names(&["b", "c"]), &[], false);
        assert_eq!(delta.channels, names(&["c"]));
    }

    #[test]
    fn test_presence_flag_expands_wire_lists() {
        let mut set = SubscriptionSet::new();
        set.add(&names(&["chat"]), &names(&["rooms"]), true);
        set.add(&names(&["alerts"]), &[], false);

        assert_eq!(set.wire_channels(), names(&["alerts", "chat", "chat-pnpres"]));
        assert_eq!(set.wire_channel_groups(), names(&["rooms", "rooms-pnpres"]));
        assert_eq!(set.channels(), names(&["alerts", "chat"]));
    }

    #[test]
    fn test_enabling_presence_later_is_a_change() {
        let mut set = SubscriptionSet::new();
        set.add(&names(&["chat"]), &[], false);
        let delta = set.add(&names(&["chat"]), &[], true);
        assert_eq!(delta.channels, names(&["chat"]));
        assert!(set.wire_channels().contains(&"chat-pnpres".to_string()));
    }

    #[test]
    fn test_remove_presence_companion_only() {
        let mut set = SubscriptionSet::new();
        set.add(&names(&["chat"]), &[], true);
        let delta = set.remove(&names(&["chat-pnpres"]), &[]);
        assert_eq!(delta.channels, names(&["chat-pnpres"]));
        assert_eq!(set.wire_channels(), names(&["chat"]));
        assert!(set.contains_channel("chat"));
    }

    #[test]
    fn test_literal_presence_name_can_be_unsubscribed() {
        let mut set = SubscriptionSet::new();
        set.add(&names(&["chat-pnpres"]), &names(&["rooms-pnpres"]), false);
        assert_eq!(set.wire_channels(), names(&["chat-pnpres"]));

        let delta = set.remove(&names(&["chat-pnpres"]), &names(&["rooms-pnpres"]));
        assert_eq!(delta.channels, names(&["chat-pnpres"]));
        assert_eq!(delta.channel_groups, names(&["rooms-pnpres"]));
        assert!(set.is_empty());
        assert!(set.wire_channels().is_empty());
        assert!(set.wire_channel_groups().is_empty());
    }

    #[test]
    fn test_literal_and_flagged_presence_name_sent_once() {
        let mut set = SubscriptionSet::new();
        set.add(&names(&["chat", "chat-pnpres"]), &[], true);
        assert_eq!(set.wire_channels(), names(&["chat", "chat-pnpres"]));

        set.remove(&names(&["chat-pnpres"]), &[]);
        assert_eq!(set.wire_channels(), names(&["chat"]));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut set = SubscriptionSet::new();
        set.add(&names(&["a"]), &[], false);
        let delta = set.remove(&names(&["zzz"]), &names(&["nope"]));
        assert!(delta.is_empty());
        assert_eq!(set.channels(), names(&["a"]));
    }

    #[test]
    fn test_state_follows_channel_membership() {
        let mut set = SubscriptionSet::new();
        assert!(!set.set_state("a", json!({"mood": "happy"})));
        set.add(&names(&["a", "b"]), &[], false);
        assert!(set.set_state("a", json!({"mood": "happy"})));
        assert_eq!(set.state_json(), Some(json!({"a": {"mood": "happy"}})));

        set.remove(&names(&["a"]), &[]);
        assert_eq!(set.state_json(), None);
    }

    #[test]
    fn test_clear_returns_everything() {
        let mut set = SubscriptionSet::new();
        set.add(&names(&["a", "b"]), &names(&["g"]), true);
        let delta = set.clear();
        assert_eq!(delta.channels, names(&["a", "b"]));
        assert_eq!(delta.channel_groups, names(&["g"]));
        assert!(set.is_empty());
        assert!(set.wire_channels().is_empty());
    }

    #[test]
    fn test_presence_name_helpers() {
        assert!(is_presence_name("room-pnpres"));
        assert!(!is_presence_name("-pnpres"));
        assert!(!is_presence_name("room"));
        assert_eq!(strip_presence_suffix("room-pnpres"), "room");
        assert_eq!(strip_presence_suffix("room"), "room");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(Vec<String>, Vec<String>),
        Remove(Vec<String>, Vec<String>),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let name = prop::sample::select(vec!["a", "b", "c", "a-pnpres", "b-pnpres", "c-pnpres"]).prop_map(String::from);
        let list = prop::collection::vec(name, 0..4);
        prop_oneof![
            (list.clone(), list.clone()).prop_map(|(c, g)| Op::Add(c, g)),
            (list.clone(), list).prop_map(|(c, g)| Op::Remove(c, g)),
        ]
    }

    proptest! {
        #[test]
        fn prop_set_equals_net_effect_of_operations(ops in prop::collection::vec(op_strategy(), 0..40)) {
            let mut set = SubscriptionSet::new();
            let mut model_channels: HashSet<String> = HashSet::new();
            let mut model_groups: HashSet<String> = HashSet::new();

            for op in ops {
                match op {
                    Op::Add(c, g) => {
                        set.add(&c, &g, false);
                        model_channels.extend(c);
                        model_groups.extend(g);
                    }
                    Op::Remove(c, g) => {
                        set.remove(&c, &g);
                        for name in &c { model_channels.remove(name); }
                        for name in &g { model_groups.remove(name); }
                    }
                }
            }

            let mut expected_channels: Vec<String> = model_channels.into_iter().collect();
            expected_channels.sort();
            let mut expected_groups: Vec<String> = model_groups.into_iter().collect();
            expected_groups.sort();
            prop_assert_eq!(set.wire_channels(), expected_channels);
            prop_assert_eq!(set.wire_channel_groups(), expected_groups);
        }
    }
}
