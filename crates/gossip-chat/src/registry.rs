use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gossip_types::{Msg, User};
use tracing::{debug, info};

use crate::channel::Channel;
use crate::error::{ChatError, StoreError};
use crate::store::Store;

/// Serializes membership changes per channel.
///
/// Each mutating call takes the channel's lock, loads the channel from the
/// store, mutates it and saves it before releasing the lock. Two requests on
/// different channels never contend.
pub struct Registry {
    store: Arc<dyn Store>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Registry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn channel_lock(&self, name: &str) -> Result<Arc<Mutex<()>>, ChatError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| ChatError::StoreUnavailable(anyhow::anyhow!("registry lock poisoned: {}", e)))?;
        Ok(locks.entry(name.to_string()).or_default().clone())
    }

    /// Drop the map entry for `name` once no other caller holds or waits on
    /// `lock`. Clones are only handed out under the map lock, so a count of
    /// two (map plus ours) means nobody else can reach it.
    fn release_channel_lock(&self, name: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        let idle = locks
            .get(name)
            .is_some_and(|entry| Arc::ptr_eq(entry, lock) && Arc::strong_count(lock) == 2);
        if idle {
            locks.remove(name);
        }
    }

    /// Run `f` with exclusive access to the channel named `name`.
    fn with_channel_lock<T>(
        &self,
        name: &str,
        f: impl FnOnce() -> Result<T, ChatError>,
    ) -> Result<T, ChatError> {
        let lock = self.channel_lock(name)?;
        let result = match lock.lock() {
            Ok(_guard) => f(),
            Err(e) => Err(ChatError::StoreUnavailable(anyhow::anyhow!(
                "channel lock poisoned: {}",
                e
            ))),
        };
        self.release_channel_lock(name, &lock);
        result
    }

    /// Create and persist a new channel. An existing channel is never
    /// replaced, so its secret stays the one minted first.
    pub fn create_channel(&self, name: &str, private: bool) -> Result<Channel, ChatError> {
        self.with_channel_lock(name, || {
            match self.store.get(name) {
                Ok(_) => return Err(ChatError::ChannelExists(name.to_string())),
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }

            let channel = Channel::new(name, private);
            self.store.save(&channel)?;
            info!("Channel {} created (private: {})", name, private);
            Ok(channel)
        })
    }

    /// Claim a nick in `channel` on behalf of a caller holding the channel
    /// secret. Returns the member secret.
    pub fn register(
        &self,
        channel: &str,
        channel_secret: &str,
        candidate: User,
        presented_secret: &str,
    ) -> Result<String, ChatError> {
        self.with_channel_lock(channel, || {
            let mut ch = self.store.get(channel)?;
            if !ch.verify_secret(channel_secret) {
                return Err(ChatError::InvalidChannelSecret);
            }

            let nick = candidate.nick.clone();
            let secret = ch.register(candidate, presented_secret)?;
            self.store.save(&ch)?;

            debug!("Nick {} registered in {}", nick, channel);
            Ok(secret)
        })
    }

    /// Members of `channel` with secrets redacted.
    pub fn members(&self, channel: &str, channel_secret: &str) -> Result<Vec<User>, ChatError> {
        let ch = self.store.get(channel)?;
        if !ch.verify_secret(channel_secret) {
            return Err(ChatError::InvalidChannelSecret);
        }
        Ok(ch.list_members())
    }

    /// Check that `secret` proves ownership of `nick` in `channel`.
    pub fn authenticate_member(&self, channel: &str, nick: &str, secret: &str) -> Result<(), ChatError> {
        let ch = self.store.get(channel)?;
        if !ch.verify_member(nick, secret) {
            return Err(ChatError::InvalidChannelSecret);
        }
        Ok(())
    }

    /// The last `limit` messages of `channel` for an authenticated member.
    /// Advances the member's read marker to the newest message returned.
    pub fn history(
        &self,
        channel: &str,
        nick: &str,
        secret: &str,
        limit: u32,
    ) -> Result<Vec<Msg>, ChatError> {
        self.authenticate_member(channel, nick, secret)?;

        let messages = self.store.recent_messages(channel, limit)?;
        if let Some(last) = messages.last() {
            self.store.mark_read(nick, channel, last.seq)?;
        }
        Ok(messages)
    }

    pub fn list_channels(&self) -> Result<Vec<String>, ChatError> {
        Ok(self.store.list_channels()?)
    }

    pub fn unread_count(&self, nick: &str, channel: &str) -> u64 {
        self.store.get_unread_count(nick, channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    /// Store holding channels in memory. Saves can be made to fail.
    #[derive(Default)]
    struct MemoryStore {
        channels: Mutex<HashMap<String, Channel>>,
        fail_saves: std::sync::atomic::AtomicBool,
    }

    impl Store for MemoryStore {
        fn save(&self, channel: &Channel) -> Result<(), StoreError> {
            if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::Unavailable(anyhow::anyhow!("disk full")));
            }
            self.channels
                .lock()
                .unwrap()
                .insert(channel.name().to_string(), channel.clone());
            Ok(())
        }

        fn get(&self, name: &str) -> Result<Channel, StoreError> {
            self.channels
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(name.to_string()))
        }

        fn list_channels(&self) -> Result<Vec<String>, StoreError> {
            Ok(self.channels.lock().unwrap().keys().cloned().collect())
        }

        fn get_unread_count(&self, _nick: &str, _channel: &str) -> u64 {
            0
        }

        fn recent_messages(&self, _channel: &str, _limit: u32) -> Result<Vec<Msg>, StoreError> {
            Ok(vec![])
        }

        fn mark_read(&self, _nick: &str, _channel: &str, _seq: u64) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn registry() -> (Arc<MemoryStore>, Registry) {
        let store = Arc::new(MemoryStore::default());
        let registry = Registry::new(store.clone());
        (store, registry)
    }

    fn member_count(store: &MemoryStore, channel: &str) -> usize {
        store.get(channel).unwrap().member_count()
    }

    fn lock_entries(reg: &Registry) -> usize {
        reg.locks.lock().unwrap().len()
    }

    #[test]
    fn claim_reclaim_and_reject_scenario() {
        let (store, reg) = registry();
        let ch = reg.create_channel("general", false).unwrap();
        let s1 = ch.secret().to_string();
        assert!(!s1.is_empty());

        let alice = || User::new("alice", "Alice", "a@example.com");

        let s2 = reg.register("general", &s1, alice(), "").unwrap();
        assert_eq!(member_count(&store, "general"), 1);

        let again = reg.register("general", &s1, alice(), &s2).unwrap();
        assert_eq!(again, s2);
        assert_eq!(member_count(&store, "general"), 1);

        let err = reg.register("general", &s1, alice(), "not_the_secret").unwrap_err();
        assert!(matches!(err, ChatError::NickTaken));
        assert_eq!(member_count(&store, "general"), 1);
    }

    #[test]
    fn create_channel_does_not_replace_existing() {
        let (store, reg) = registry();
        let first = reg.create_channel("general", false).unwrap();

        let err = reg.create_channel("general", true).unwrap_err();
        assert!(matches!(err, ChatError::ChannelExists(_)));
        assert_eq!(store.get("general").unwrap().secret(), first.secret());
    }

    #[test]
    fn register_requires_channel_secret() {
        let (_store, reg) = registry();
        reg.create_channel("general", false).unwrap();

        let err = reg
            .register("general", "bogus", User::new("alice", "", ""), "")
            .unwrap_err();
        assert!(matches!(err, ChatError::InvalidChannelSecret));
    }

    #[test]
    fn register_on_missing_channel() {
        let (_store, reg) = registry();
        let err = reg
            .register("nowhere", "x", User::new("alice", "", ""), "")
            .unwrap_err();
        assert!(matches!(err, ChatError::ChannelNotFound(name) if name == "nowhere"));
    }

    #[test]
    fn failed_save_leaves_membership_untouched() {
        let (store, reg) = registry();
        let ch = reg.create_channel("general", false).unwrap();

        store.fail_saves.store(true, std::sync::atomic::Ordering::SeqCst);
        let err = reg
            .register("general", ch.secret(), User::new("alice", "", ""), "")
            .unwrap_err();
        assert!(matches!(err, ChatError::StoreUnavailable(_)));

        store.fail_saves.store(false, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(member_count(&store, "general"), 0);

        // The nick is still free after the failed attempt.
        reg.register("general", ch.secret(), User::new("alice", "", ""), "")
            .unwrap();
        assert_eq!(member_count(&store, "general"), 1);
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        const N: usize = 16;

        let (store, reg) = registry();
        let secret = reg.create_channel("general", false).unwrap().secret().to_string();
        let reg = Arc::new(reg);
        let barrier = Arc::new(Barrier::new(N));

        let handles: Vec<_> = (0..N)
            .map(|i| {
                let reg = reg.clone();
                let barrier = barrier.clone();
                let secret = secret.clone();
                thread::spawn(move || {
                    barrier.wait();
                    reg.register("general", &secret, User::new("alice", format!("racer {i}"), ""), "")
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        let taken = results
            .iter()
            .filter(|r| matches!(r, Err(ChatError::NickTaken)))
            .count();

        assert_eq!(wins, 1);
        assert_eq!(taken, N - 1);
        assert_eq!(member_count(&store, "general"), 1);
        assert_eq!(lock_entries(&reg), 0);
    }

    #[test]
    fn unknown_channels_leave_no_lock_entries() {
        let (_store, reg) = registry();
        for i in 0..1000 {
            let err = reg
                .register(&format!("nope{i}"), "x", User::new("alice", "", ""), "")
                .unwrap_err();
            assert!(matches!(err, ChatError::ChannelNotFound(_)));
        }
        assert_eq!(lock_entries(&reg), 0);

        let secret = reg.create_channel("general", false).unwrap().secret().to_string();
        reg.register("general", &secret, User::new("alice", "", ""), "").unwrap();
        assert_eq!(lock_entries(&reg), 0);
    }

    #[test]
    fn nicks_stay_unique_across_many_claims() {
        let (store, reg) = registry();
        let secret = reg.create_channel("general", false).unwrap().secret().to_string();

        for nick in ["alice", "bob", "alice", "carol", "bob", "alice"] {
            let _ = reg.register("general", &secret, User::new(nick, "", ""), "");
        }

        let members = reg.members("general", &secret).unwrap();
        let nicks: Vec<_> = members.iter().map(|u| u.nick.as_str()).collect();
        assert_eq!(nicks, vec!["alice", "bob", "carol"]);
        assert_eq!(member_count(&store, "general"), 3);
    }

    #[test]
    fn members_checks_secret_and_redacts() {
        let (_store, reg) = registry();
        let secret = reg.create_channel("general", false).unwrap().secret().to_string();
        reg.register("general", &secret, User::new("alice", "", ""), "").unwrap();

        assert!(matches!(
            reg.members("general", "nope"),
            Err(ChatError::InvalidChannelSecret)
        ));
        let members = reg.members("general", &secret).unwrap();
        assert!(members[0].secret.is_empty());
    }

    #[test]
    fn authenticate_member_checks_nick_secret() {
        let (_store, reg) = registry();
        let secret = reg.create_channel("general", false).unwrap().secret().to_string();
        let member = reg.register("general", &secret, User::new("alice", "", ""), "").unwrap();

        assert!(reg.authenticate_member("general", "alice", &member).is_ok());
        assert!(reg.authenticate_member("general", "alice", "nope").is_err());
        assert!(reg.authenticate_member("general", "bob", &member).is_err());
    }
}
