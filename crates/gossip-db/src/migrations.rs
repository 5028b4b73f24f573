use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (channels, members, messages)");
        conn.execute_batch(
            "
            CREATE TABLE channels (
                name        TEXT PRIMARY KEY,
                secret      TEXT NOT NULL,
                private     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE members (
                channel     TEXT NOT NULL REFERENCES channels(name) ON DELETE CASCADE,
                nick        TEXT NOT NULL,
                full_name   TEXT NOT NULL DEFAULT '',
                email       TEXT NOT NULL DEFAULT '',
                secret      TEXT NOT NULL,
                PRIMARY KEY (channel, nick)
            );

            -- (channel, seq) is the deduplication key for redelivered messages
            CREATE TABLE messages (
                channel     TEXT NOT NULL,
                seq         INTEGER NOT NULL,
                sender      TEXT NOT NULL,
                text        TEXT NOT NULL,
                sent_at     TEXT NOT NULL,
                PRIMARY KEY (channel, seq)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (read markers)");
        conn.execute_batch(
            "
            CREATE TABLE read_markers (
                channel     TEXT NOT NULL,
                nick        TEXT NOT NULL,
                last_seq    INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (channel, nick)
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
