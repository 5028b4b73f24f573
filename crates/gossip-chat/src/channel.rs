use std::collections::HashMap;

use gossip_types::User;

use crate::error::ChatError;
use crate::secret;

/// A named, secret-protected namespace of claimed nicks.
///
/// `name` and `secret` are fixed at construction. Membership is only changed
/// through [`Channel::register`], which needs `&mut self`; callers sharing a
/// channel across requests serialize through [`crate::Registry`].
#[derive(Debug, Clone)]
pub struct Channel {
    name: String,
    secret: String,
    private: bool,
    members: HashMap<String, User>,
}

impl Channel {
    /// New channel with a freshly generated secret and no members.
    pub fn new(name: impl Into<String>, private: bool) -> Self {
        Self {
            name: name.into(),
            secret: secret::channel_secret(),
            private,
            members: HashMap::new(),
        }
    }

    /// Rebuild a channel from its persisted parts.
    pub fn restore(
        name: impl Into<String>,
        secret: impl Into<String>,
        private: bool,
        members: impl IntoIterator<Item = User>,
    ) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
            private,
            members: members.into_iter().map(|u| (u.nick.clone(), u)).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn is_private(&self) -> bool {
        self.private
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn member(&self, nick: &str) -> Option<&User> {
        self.members.get(nick)
    }

    /// Whether `secret` is the channel's admin secret.
    pub fn verify_secret(&self, secret: &str) -> bool {
        !secret.is_empty() && self.secret == secret
    }

    /// Whether `secret` proves ownership of `nick`.
    pub fn verify_member(&self, nick: &str, secret: &str) -> bool {
        !secret.is_empty()
            && self
                .members
                .get(nick)
                .is_some_and(|u| u.secret == secret)
    }

    /// Claim `candidate.nick` in this channel.
    ///
    /// An unclaimed nick is admitted with a newly generated secret; any
    /// presented secret is ignored on a first claim. A claimed nick is only
    /// re-admitted when `presented` matches the stored secret, in which case
    /// the descriptive fields are refreshed and the existing secret returned.
    pub fn register(&mut self, candidate: User, presented: &str) -> Result<String, ChatError> {
        if candidate.nick.is_empty() {
            return Err(ChatError::InvalidInput("nick is required".into()));
        }

        if let Some(existing) = self.members.get_mut(&candidate.nick) {
            if presented.is_empty() || existing.secret != presented {
                return Err(ChatError::NickTaken);
            }
            existing.full_name = candidate.full_name;
            existing.email = candidate.email;
            return Ok(existing.secret.clone());
        }

        let secret = secret::member_secret();
        let user = User {
            secret: secret.clone(),
            ..candidate
        };
        self.members.insert(user.nick.clone(), user);
        Ok(secret)
    }

    /// Members sorted by nick, with secrets redacted.
    pub fn list_members(&self) -> Vec<User> {
        let mut members: Vec<User> = self.members.values().map(User::redacted).collect();
        members.sort_by(|a, b| a.nick.cmp(&b.nick));
        members
    }

    /// Members including their secrets, for persistence only.
    pub fn snapshot(&self) -> impl Iterator<Item = &User> {
        self.members.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User::new("alice", "Alice", "alice@example.com")
    }

    #[test]
    fn new_channel_has_secret_and_no_members() {
        let ch = Channel::new("general", false);
        assert_eq!(ch.name(), "general");
        assert!(!ch.secret().is_empty());
        assert!(!ch.is_private());
        assert_eq!(ch.member_count(), 0);
    }

    #[test]
    fn first_claim_mints_secret() {
        let mut ch = Channel::new("general", false);
        let secret = ch.register(alice(), "").unwrap();
        assert!(!secret.is_empty());
        assert_eq!(ch.member_count(), 1);
        assert!(ch.verify_member("alice", &secret));
    }

    #[test]
    fn first_claim_ignores_presented_secret() {
        let mut ch = Channel::new("general", false);
        let secret = ch.register(alice(), "my_own_secret").unwrap();
        assert_ne!(secret, "my_own_secret");
        assert!(!ch.verify_member("alice", "my_own_secret"));
    }

    #[test]
    fn reclaim_with_matching_secret_updates_fields() {
        let mut ch = Channel::new("general", false);
        let s1 = ch.register(alice(), "").unwrap();

        let renamed = User::new("alice", "Alice B", "ab@example.com");
        let s2 = ch.register(renamed, &s1).unwrap();

        assert_eq!(s1, s2);
        assert_eq!(ch.member_count(), 1);
        let stored = ch.member("alice").unwrap();
        assert_eq!(stored.full_name, "Alice B");
        assert_eq!(stored.email, "ab@example.com");
    }

    #[test]
    fn reclaim_with_wrong_or_empty_secret_is_rejected() {
        let mut ch = Channel::new("general", false);
        ch.register(alice(), "").unwrap();

        let impostor = User::new("alice", "Mallory", "m@example.com");
        assert!(matches!(ch.register(impostor.clone(), "wrong"), Err(ChatError::NickTaken)));
        assert!(matches!(ch.register(impostor, ""), Err(ChatError::NickTaken)));

        assert_eq!(ch.member_count(), 1);
        assert_eq!(ch.member("alice").unwrap().full_name, "Alice");
    }

    #[test]
    fn list_members_redacts_secrets() {
        let mut ch = Channel::new("general", false);
        ch.register(User::new("bob", "", ""), "").unwrap();
        ch.register(alice(), "").unwrap();

        let members = ch.list_members();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].nick, "alice");
        assert_eq!(members[1].nick, "bob");
        assert!(members.iter().all(|u| u.secret.is_empty()));
    }

    #[test]
    fn channel_secret_check() {
        let ch = Channel::restore("general", "abc", true, []);
        assert!(ch.verify_secret("abc"));
        assert!(!ch.verify_secret("abd"));
        assert!(!ch.verify_secret(""));
        assert!(ch.is_private());
    }
}
