use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A claimed identity inside one channel.
///
/// `secret` is only ever serialized when it is non-empty, so a redacted copy
/// (see `User::redacted`) never leaks an empty `"secret"` field either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub nick: String,
    #[serde(rename = "name", default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret: String,
}

impl User {
    pub fn new(nick: impl Into<String>, full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            full_name: full_name.into(),
            email: email.into(),
            secret: String::new(),
        }
    }

    /// Copy of this user with the secret stripped.
    pub fn redacted(&self) -> Self {
        Self {
            secret: String::new(),
            ..self.clone()
        }
    }
}

/// One ingested chat event.
///
/// `seq` is the broker-assigned position within the channel's delivery
/// stream. It is optional on the wire; the ingestion pipeline always
/// overwrites it with the position the broker delivered it at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Msg {
    pub from: String,
    pub text: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub seq: u64,
}

impl Msg {
    pub fn new(from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            text: text.into(),
            time: Utc::now(),
            seq: 0,
        }
    }
}
