use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use alexandria_shared::message::{ChatMessage, Role};
use alexandria_shared::sources::SourceRef;
use alexandria_shared::types::OrganizationId;

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Persist one finalized message under the given organization.
    pub fn insert_message(
        &self,
        organization: &OrganizationId,
        message: &ChatMessage,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, organization_id, role, text, created_at,
                                   insufficient_info, sources, enhanced_sources)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.id.to_string(),
                organization.to_string(),
                role_to_str(message.role),
                message.text,
                message.created_at.to_rfc3339(),
                message.insufficient_info as i32,
                serde_json::to_string(&message.sources)?,
                serde_json::to_string(&message.enhanced_sources)?,
            ],
        )?;
        Ok(())
    }

    /// Full transcript for an organization, in creation order.
    pub fn history_for_organization(
        &self,
        organization: &OrganizationId,
    ) -> Result<Vec<ChatMessage>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, role, text, created_at, insufficient_info, sources, enhanced_sources
             FROM messages
             WHERE organization_id = ?1
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![organization.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn get_message_by_id(&self, id: Uuid) -> Result<ChatMessage> {
        self.conn()
            .query_row(
                "SELECT id, role, text, created_at, insufficient_info, sources, enhanced_sources
                 FROM messages WHERE id = ?1",
                params![id.to_string()],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Delete an organization's transcript.  Returns the number of messages
    /// removed.
    pub fn clear_history(&self, organization: &OrganizationId) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM messages WHERE organization_id = ?1",
            params![organization.to_string()],
        )?;
        Ok(affected)
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    let id_str: String = row.get(0)?;
    let role_str: String = row.get(1)?;
    let text: String = row.get(2)?;
    let ts_str: String = row.get(3)?;
    let insufficient_int: i32 = row.get(4)?;
    let sources_json: String = row.get(5)?;
    let enhanced_json: String = row.get(6)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let role = match role_str.as_str() {
        "user" => Role::User,
        _ => Role::Assistant,
    };

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let sources: Vec<SourceRef> = serde_json::from_str(&sources_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let enhanced_sources: Vec<SourceRef> = serde_json::from_str(&enhanced_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ChatMessage {
        id,
        role,
        text,
        created_at,
        streaming: false,
        thinking: false,
        insufficient_info: insufficient_int != 0,
        sources,
        enhanced_sources,
        thinking_text: None,
    })
}
