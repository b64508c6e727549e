use crate::link::{LinkId, LinkKey};
use murmur_core::ChannelId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// What the registry needs to know about the links it owns.
pub trait RegistryEntry {
    fn link_id(&self) -> LinkId;

    /// False once the link has reached its terminal state.
    fn is_live(&self) -> bool;
}

/// Ownership table: at most one live link per (channel, remote identity).
pub struct ConnectionRegistry<L> {
    links: HashMap<LinkKey, L>,
    next_id: u64,
}

impl<L: RegistryEntry> ConnectionRegistry<L> {
    pub fn new() -> Self {
        Self {
            links: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn allocate_id(&mut self) -> LinkId {
        let id = LinkId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Number of link ids handed out over the registry's lifetime.
    pub fn created(&self) -> u64 {
        self.next_id - 1
    }

    /// Stores `link` under `key`.
    ///
    /// If a live link is already present it is kept and `link` is handed back
    /// so the caller can dispose of it.
    pub fn insert(&mut self, key: LinkKey, link: L) -> Result<&mut L, L> {
        match self.links.entry(key) {
            Entry::Occupied(entry) if entry.get().is_live() => Err(link),
            Entry::Occupied(mut entry) => {
                entry.insert(link);
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => Ok(entry.insert(link)),
        }
    }

    pub fn contains_live(&self, key: &LinkKey) -> bool {
        self.links.get(key).is_some_and(RegistryEntry::is_live)
    }

    pub fn get(&self, key: &LinkKey) -> Option<&L> {
        self.links.get(key)
    }

    pub fn get_mut(&mut self, key: &LinkKey) -> Option<&mut L> {
        self.links.get_mut(key)
    }

    /// The link under `key` only if it is still the instance `link_id`.
    pub fn get_current(&mut self, key: &LinkKey, link_id: LinkId) -> Option<&mut L> {
        self.links
            .get_mut(key)
            .filter(|link| link.link_id() == link_id && link.is_live())
    }

    pub fn remove(&mut self, key: &LinkKey) -> Option<L> {
        self.links.remove(key)
    }

    pub fn keys_in(&self, channel_id: &ChannelId) -> Vec<LinkKey> {
        let mut keys: Vec<_> = self
            .links
            .keys()
            .filter(|key| &key.channel_id == channel_id)
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn keys(&self) -> Vec<LinkKey> {
        let mut keys: Vec<_> = self.links.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LinkKey, &L)> {
        self.links.iter()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut L> {
        self.links.values_mut()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl<L: RegistryEntry> Default for ConnectionRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}
