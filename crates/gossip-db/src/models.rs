/// Database row types, mapping directly to SQLite rows.
/// Kept apart from gossip-types so the DB layer stays independent.

pub struct ChannelRow {
    pub name: String,
    pub secret: String,
    pub private: bool,
}

pub struct MemberRow {
    pub nick: String,
    pub full_name: String,
    pub email: String,
    pub secret: String,
}

pub struct MessageRow {
    pub seq: i64,
    pub sender: String,
    pub text: String,
    pub sent_at: String,
}
