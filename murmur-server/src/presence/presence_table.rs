use murmur_core::{ChannelId, Identity};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub type PresenceSnapshot = BTreeMap<ChannelId, BTreeSet<Identity>>;

/// channel -> members, plus the reverse index used for disconnect cleanup.
#[derive(Debug, Default)]
pub struct PresenceTable {
    channels: HashMap<ChannelId, BTreeSet<Identity>>,
    memberships: HashMap<Identity, BTreeSet<ChannelId>>,
}

impl PresenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `identity` was already a member.
    pub fn join(&mut self, channel_id: &ChannelId, identity: &Identity) -> bool {
        let added = self
            .channels
            .entry(channel_id.clone())
            .or_default()
            .insert(identity.clone());

        if added {
            self.memberships
                .entry(identity.clone())
                .or_default()
                .insert(channel_id.clone());
        }
        added
    }

    /// Returns false if `identity` was not a member.
    pub fn leave(&mut self, channel_id: &ChannelId, identity: &Identity) -> bool {
        let Some(members) = self.channels.get_mut(channel_id) else {
            return false;
        };
        let removed = members.remove(identity);
        if members.is_empty() {
            self.channels.remove(channel_id);
        }

        if let Some(channels) = self.memberships.get_mut(identity) {
            channels.remove(channel_id);
            if channels.is_empty() {
                self.memberships.remove(identity);
            }
        }
        removed
    }

    pub fn is_member(&self, channel_id: &ChannelId, identity: &Identity) -> bool {
        self.channels
            .get(channel_id)
            .is_some_and(|members| members.contains(identity))
    }

    /// Current members of `channel_id` other than `except`.
    pub fn members_except(&self, channel_id: &ChannelId, except: &Identity) -> Vec<Identity> {
        self.channels
            .get(channel_id)
            .map(|members| members.iter().filter(|m| *m != except).cloned().collect())
            .unwrap_or_default()
    }

    pub fn channels_of(&self, identity: &Identity) -> Vec<ChannelId> {
        self.memberships
            .get(identity)
            .map(|channels| channels.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> PresenceSnapshot {
        self.channels
            .iter()
            .map(|(channel, members)| (channel.clone(), members.clone()))
            .collect()
    }
}
