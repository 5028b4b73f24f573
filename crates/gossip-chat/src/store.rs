use gossip_types::Msg;

use crate::channel::Channel;
use crate::error::StoreError;

/// Durable keeper of channel records, membership snapshots, message logs and
/// read markers.
pub trait Store: Send + Sync {
    /// Upsert the channel and replace its membership snapshot.
    fn save(&self, channel: &Channel) -> Result<(), StoreError>;

    /// Load a channel. Fails with [`StoreError::NotFound`] when absent.
    fn get(&self, name: &str) -> Result<Channel, StoreError>;

    fn list_channels(&self) -> Result<Vec<String>, StoreError>;

    /// Messages in `channel` past the nick's read marker. Never fails: any
    /// internal error counts as zero.
    fn get_unread_count(&self, nick: &str, channel: &str) -> u64;

    /// The last `limit` messages of `channel`, ascending by seq.
    fn recent_messages(&self, channel: &str, limit: u32) -> Result<Vec<Msg>, StoreError>;

    /// Move the nick's read marker forward to `seq`. Never moves it back.
    fn mark_read(&self, nick: &str, channel: &str, seq: u64) -> Result<(), StoreError>;
}
