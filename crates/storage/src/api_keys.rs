//! The `api_keys` table. Rows cascade away with their owning deployment.

use rusqlite::{params, OptionalExtension};

use gatehouse_domain::model::{ApiKey, ApiKeySource, ApiKeyStatus};
use gatehouse_domain::{Error, Result};

use crate::{map_sqlite_err, parse_dt, parse_opt_dt, PersistentStorage};

struct ApiKeyRow {
    id: String,
    name: String,
    api_key: String,
    masked_api_key: String,
    api_id: String,
    operations: String,
    status: String,
    created_at: String,
    created_by: String,
    updated_at: String,
    expires_at: Option<String>,
    expires_in_unit: Option<String>,
    expires_in_duration: Option<i64>,
    source: String,
    external_ref_id: Option<String>,
    index_key: Option<String>,
    display_name: String,
}

const SELECT_COLUMNS: &str = "id, name, api_key, masked_api_key, apiId, operations, status,
     created_at, created_by, updated_at, expires_at, expires_in_unit,
     expires_in_duration, source, external_ref_id, index_key, display_name";

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApiKeyRow> {
    Ok(ApiKeyRow {
        id: row.get(0)?,
        name: row.get(1)?,
        api_key: row.get(2)?,
        masked_api_key: row.get(3)?,
        api_id: row.get(4)?,
        operations: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        created_by: row.get(8)?,
        updated_at: row.get(9)?,
        expires_at: row.get(10)?,
        expires_in_unit: row.get(11)?,
        expires_in_duration: row.get(12)?,
        source: row.get(13)?,
        external_ref_id: row.get(14)?,
        index_key: row.get(15)?,
        display_name: row.get(16)?,
    })
}

fn raw_to_key(raw: ApiKeyRow) -> Result<ApiKey> {
    let status = ApiKeyStatus::parse(&raw.status)
        .ok_or_else(|| Error::Internal(format!("unknown key status {:?}", raw.status)))?;
    let source = ApiKeySource::parse(&raw.source)
        .ok_or_else(|| Error::Internal(format!("unknown key source {:?}", raw.source)))?;
    Ok(ApiKey {
        id: raw.id,
        name: raw.name,
        api_key: raw.api_key,
        masked_api_key: raw.masked_api_key,
        api_id: raw.api_id,
        operations: serde_json::from_str(&raw.operations)?,
        status,
        created_at: parse_dt(&raw.created_at)?,
        created_by: raw.created_by,
        updated_at: parse_dt(&raw.updated_at)?,
        expires_at: parse_opt_dt(raw.expires_at)?,
        expires_in_unit: raw.expires_in_unit,
        expires_in_duration: raw.expires_in_duration,
        source,
        external_ref_id: raw.external_ref_id,
        index_key: raw.index_key,
        display_name: raw.display_name,
    })
}

impl PersistentStorage {
    pub fn insert_api_key(&self, key: &ApiKey) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO api_keys
                 (id, name, api_key, masked_api_key, apiId, operations, status,
                  created_at, created_by, updated_at, expires_at, expires_in_unit,
                  expires_in_duration, source, external_ref_id, index_key, display_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                key.id,
                key.name,
                key.api_key,
                key.masked_api_key,
                key.api_id,
                serde_json::to_string(&key.operations)?,
                key.status.as_str(),
                key.created_at.to_rfc3339(),
                key.created_by,
                key.updated_at.to_rfc3339(),
                key.expires_at.map(|t| t.to_rfc3339()),
                key.expires_in_unit,
                key.expires_in_duration,
                key.source.as_str(),
                key.external_ref_id,
                key.index_key,
                key.display_name,
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn update_api_key(&self, key: &ApiKey) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE api_keys SET
                     name = ?2, api_key = ?3, masked_api_key = ?4, apiId = ?5,
                     operations = ?6, status = ?7, updated_at = ?8, expires_at = ?9,
                     expires_in_unit = ?10, expires_in_duration = ?11, source = ?12,
                     external_ref_id = ?13, index_key = ?14, display_name = ?15
                 WHERE id = ?1",
                params![
                    key.id,
                    key.name,
                    key.api_key,
                    key.masked_api_key,
                    key.api_id,
                    serde_json::to_string(&key.operations)?,
                    key.status.as_str(),
                    key.updated_at.to_rfc3339(),
                    key.expires_at.map(|t| t.to_rfc3339()),
                    key.expires_in_unit,
                    key.expires_in_duration,
                    key.source.as_str(),
                    key.external_ref_id,
                    key.index_key,
                    key.display_name,
                ],
            )
            .map_err(map_sqlite_err)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("api key {}", key.id)));
        }
        Ok(())
    }

    pub fn delete_api_key(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute("DELETE FROM api_keys WHERE id = ?1", params![id])
            .map_err(map_sqlite_err)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("api key {id}")));
        }
        Ok(())
    }

    pub fn get_api_key(&self, id: &str) -> Result<Option<ApiKey>> {
        let conn = self.conn()?;
        let raw = conn
            .prepare(&format!("SELECT {SELECT_COLUMNS} FROM api_keys WHERE id = ?1"))
            .map_err(map_sqlite_err)?
            .query_row(params![id], row_to_raw)
            .optional()
            .map_err(map_sqlite_err)?;
        raw.map(raw_to_key).transpose()
    }

    /// Everything in the table, for the startup re-import.
    pub fn load_api_keys(&self) -> Result<Vec<ApiKey>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM api_keys ORDER BY created_at"
            ))
            .map_err(map_sqlite_err)?;
        let rows = stmt.query_map([], row_to_raw).map_err(map_sqlite_err)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(raw_to_key(raw.map_err(map_sqlite_err)?)?);
        }
        Ok(out)
    }
}
