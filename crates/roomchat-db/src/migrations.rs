use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS rooms (
            id          TEXT PRIMARY KEY,
            body        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            room_id     TEXT,
            created_at  TEXT,
            body        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_room_created
            ON messages(room_id, created_at, id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
