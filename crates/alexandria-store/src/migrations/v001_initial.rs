//! v001 -- initial schema.
//!
//! One table: `messages`, holding every organization's chat transcript.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id                TEXT PRIMARY KEY NOT NULL,  -- message UUID
    organization_id   TEXT NOT NULL,              -- owning organization UUID
    role              TEXT NOT NULL,              -- 'user' | 'assistant'
    text              TEXT NOT NULL,
    created_at        TEXT NOT NULL,              -- RFC 3339
    insufficient_info INTEGER NOT NULL DEFAULT 0,
    sources           TEXT NOT NULL,              -- JSON array of source refs
    enhanced_sources  TEXT NOT NULL               -- JSON array of source refs
);

CREATE INDEX IF NOT EXISTS idx_messages_org_created
    ON messages(organization_id, created_at ASC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
