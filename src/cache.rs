use std::sync::{Arc, RwLock};

use crate::identity::Identity;

/// Single-slot store holding the last-known identity.
///
/// The slot starts absent and is only ever overwritten; sign-out overwrites
/// it with the empty identity rather than clearing it. Reads never block on
/// provider traffic and return the empty identity until the first write.
#[derive(Clone, Debug)]
pub struct SessionCache {
    slot: Arc<RwLock<Option<Identity>>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Unconditional overwrite of the current identity.
    pub fn put(&self, identity: Identity) {
        *self.slot.write().unwrap() = Some(identity);
    }

    /// Last written identity, or the empty identity if nothing was written yet.
    pub fn get(&self) -> Identity {
        self.slot
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(Identity::empty)
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_cache_reads_empty() {
        let cache = SessionCache::new();
        assert!(cache.get().is_empty());
    }

    #[test]
    fn put_overwrites_previous_value() {
        let cache = SessionCache::new();

        let mut first = Identity::empty();
        first.id = "uid-1".to_string();
        cache.put(first);
        assert_eq!(cache.get().id, "uid-1");

        let mut second = Identity::empty();
        second.id = "uid-2".to_string();
        cache.put(second);
        assert_eq!(cache.get().id, "uid-2");
    }

    #[test]
    fn sign_out_is_an_overwrite_not_a_delete() {
        let cache = SessionCache::new();

        let mut signed_in = Identity::empty();
        signed_in.id = "uid-1".to_string();
        cache.put(signed_in);

        cache.put(Identity::empty());
        assert!(cache.get().is_empty());
    }

    #[test]
    fn clones_share_the_slot() {
        let cache = SessionCache::new();
        let view = cache.clone();

        let mut identity = Identity::empty();
        identity.id = "uid-9".to_string();
        cache.put(identity);

        assert_eq!(view.get().id, "uid-9");
    }
}
