use crate::Database;
use crate::models::{ChannelRow, MemberRow, MessageRow};
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use gossip_chat::{Channel, Store, StoreError};
use gossip_ingest::ChatLog;
use gossip_types::{Msg, User};
use rusqlite::Connection;
use tracing::warn;

impl Database {
    // -- Channels --

    /// Upsert the channel row and replace its members in one transaction.
    pub fn save_channel(&self, channel: &Channel) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO channels (name, secret, private) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET private = excluded.private",
                rusqlite::params![channel.name(), channel.secret(), channel.is_private()],
            )?;
            tx.execute("DELETE FROM members WHERE channel = ?1", [channel.name()])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO members (channel, nick, full_name, email, secret)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for user in channel.snapshot() {
                    stmt.execute(rusqlite::params![
                        channel.name(),
                        user.nick,
                        user.full_name,
                        user.email,
                        user.secret
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_channel(&self, name: &str) -> Result<Option<Channel>> {
        self.with_conn(|conn| {
            let Some(row) = query_channel(conn, name)? else {
                return Ok(None);
            };
            let members = query_members(conn, name)?;
            Ok(Some(Channel::restore(
                row.name,
                row.secret,
                row.private,
                members.into_iter().map(|m| User {
                    nick: m.nick,
                    full_name: m.full_name,
                    email: m.email,
                    secret: m.secret,
                }),
            )))
        })
    }

    pub fn channel_names(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM channels ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
    }

    // -- Messages --

    /// Insert a message unless `(channel, seq)` is already stored.
    /// Returns whether a row was written.
    pub fn insert_message(&self, channel: &str, msg: &Msg) -> Result<bool> {
        self.with_conn(|conn| {
            let written = conn.execute(
                "INSERT OR IGNORE INTO messages (channel, seq, sender, text, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    channel,
                    seq_to_sql(msg.seq)?,
                    msg.from,
                    msg.text,
                    msg.time.to_rfc3339_opts(SecondsFormat::Nanos, true)
                ],
            )?;
            Ok(written > 0)
        })
    }

    pub fn get_messages(&self, channel: &str, limit: u32) -> Result<Vec<Msg>> {
        let rows = self.with_conn(|conn| query_messages(conn, channel, limit))?;
        // Newest first from the query; callers want them in log order.
        Ok(rows.into_iter().rev().map(row_to_msg).collect())
    }

    pub fn unread_count(&self, nick: &str, channel: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE channel = ?1
                   AND seq > COALESCE(
                       (SELECT last_seq FROM read_markers WHERE channel = ?1 AND nick = ?2), 0)",
                rusqlite::params![channel, nick],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    pub fn set_read_marker(&self, nick: &str, channel: &str, seq: u64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO read_markers (channel, nick, last_seq) VALUES (?1, ?2, ?3)
                 ON CONFLICT(channel, nick) DO UPDATE
                 SET last_seq = MAX(last_seq, excluded.last_seq)",
                rusqlite::params![channel, nick, seq_to_sql(seq)?],
            )?;
            Ok(())
        })
    }
}

impl Store for Database {
    fn save(&self, channel: &Channel) -> Result<(), StoreError> {
        Ok(self.save_channel(channel)?)
    }

    fn get(&self, name: &str) -> Result<Channel, StoreError> {
        self.get_channel(name)?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn list_channels(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.channel_names()?)
    }

    fn get_unread_count(&self, nick: &str, channel: &str) -> u64 {
        self.unread_count(nick, channel).unwrap_or_else(|e| {
            warn!("Unread count for {} in {} unavailable: {}", nick, channel, e);
            0
        })
    }

    fn recent_messages(&self, channel: &str, limit: u32) -> Result<Vec<Msg>, StoreError> {
        Ok(self.get_messages(channel, limit)?)
    }

    fn mark_read(&self, nick: &str, channel: &str, seq: u64) -> Result<(), StoreError> {
        Ok(self.set_read_marker(nick, channel, seq)?)
    }
}

impl ChatLog for Database {
    fn append_message(&self, channel_id: &str, msg: &Msg) -> Result<()> {
        self.insert_message(channel_id, msg).map(|_| ())
    }
}

fn seq_to_sql(seq: u64) -> Result<i64> {
    i64::try_from(seq).map_err(|_| anyhow::anyhow!("seq {} out of range", seq))
}

fn row_to_msg(row: MessageRow) -> Msg {
    let time = DateTime::parse_from_rfc3339(&row.sent_at)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Corrupt sent_at '{}' on message {}: {}", row.sent_at, row.seq, e);
            DateTime::default()
        });
    Msg {
        from: row.sender,
        text: row.text,
        time,
        seq: row.seq.max(0) as u64,
    }
}

fn query_channel(conn: &Connection, name: &str) -> Result<Option<ChannelRow>> {
    let mut stmt = conn.prepare("SELECT name, secret, private FROM channels WHERE name = ?1")?;

    let row = stmt
        .query_row([name], |row| {
            Ok(ChannelRow {
                name: row.get(0)?,
                secret: row.get(1)?,
                private: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_members(conn: &Connection, channel: &str) -> Result<Vec<MemberRow>> {
    let mut stmt = conn.prepare(
        "SELECT nick, full_name, email, secret FROM members WHERE channel = ?1 ORDER BY nick",
    )?;

    let rows = stmt
        .query_map([channel], |row| {
            Ok(MemberRow {
                nick: row.get(0)?,
                full_name: row.get(1)?,
                email: row.get(2)?,
                secret: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_messages(conn: &Connection, channel: &str, limit: u32) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT seq, sender, text, sent_at
         FROM messages
         WHERE channel = ?1
         ORDER BY seq DESC
         LIMIT ?2",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![channel, limit], |row| {
            Ok(MessageRow {
                seq: row.get(0)?,
                sender: row.get(1)?,
                text: row.get(2)?,
                sent_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
