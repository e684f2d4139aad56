//! The `llm_provider_templates` table.

use rusqlite::{params, OptionalExtension};

use gatehouse_domain::model::StoredLlmProviderTemplate;
use gatehouse_domain::{Error, Result};

use crate::{map_sqlite_err, parse_dt, PersistentStorage};

struct TemplateRow {
    id: String,
    handle: String,
    configuration: String,
    created_at: String,
    updated_at: String,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<TemplateRow> {
    Ok(TemplateRow {
        id: row.get(0)?,
        handle: row.get(1)?,
        configuration: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn raw_to_template(raw: TemplateRow) -> Result<StoredLlmProviderTemplate> {
    Ok(StoredLlmProviderTemplate {
        id: raw.id,
        handle: raw.handle,
        configuration: serde_json::from_str(&raw.configuration)?,
        created_at: parse_dt(&raw.created_at)?,
        updated_at: parse_dt(&raw.updated_at)?,
    })
}

impl PersistentStorage {
    pub fn insert_template(&self, tpl: &StoredLlmProviderTemplate) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO llm_provider_templates
                 (id, handle, configuration, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                tpl.id,
                tpl.handle,
                serde_json::to_string(&tpl.configuration)?,
                tpl.created_at.to_rfc3339(),
                tpl.updated_at.to_rfc3339(),
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn update_template(&self, tpl: &StoredLlmProviderTemplate) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE llm_provider_templates SET
                     handle = ?2, configuration = ?3, updated_at = ?4
                 WHERE id = ?1",
                params![
                    tpl.id,
                    tpl.handle,
                    serde_json::to_string(&tpl.configuration)?,
                    tpl.updated_at.to_rfc3339(),
                ],
            )
            .map_err(map_sqlite_err)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("template {}", tpl.id)));
        }
        Ok(())
    }

    pub fn delete_template(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "DELETE FROM llm_provider_templates WHERE id = ?1",
                params![id],
            )
            .map_err(map_sqlite_err)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("template {id}")));
        }
        Ok(())
    }

    pub fn get_template(&self, id: &str) -> Result<Option<StoredLlmProviderTemplate>> {
        let conn = self.conn()?;
        let raw = conn
            .prepare(
                "SELECT id, handle, configuration, created_at, updated_at
                 FROM llm_provider_templates WHERE id = ?1",
            )
            .map_err(map_sqlite_err)?
            .query_row(params![id], row_to_raw)
            .optional()
            .map_err(map_sqlite_err)?;
        raw.map(raw_to_template).transpose()
    }

    pub fn load_templates(&self) -> Result<Vec<StoredLlmProviderTemplate>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, handle, configuration, created_at, updated_at
                 FROM llm_provider_templates ORDER BY handle",
            )
            .map_err(map_sqlite_err)?;
        let rows = stmt.query_map([], row_to_raw).map_err(map_sqlite_err)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(raw_to_template(raw.map_err(map_sqlite_err)?)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sample(handle: &str) -> StoredLlmProviderTemplate {
        let now = Utc::now();
        StoredLlmProviderTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            handle: handle.into(),
            configuration: serde_json::json!({"models": ["small", "large"]}),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn template_roundtrip_and_update() {
        let storage = PersistentStorage::open_in_memory().expect("open");
        let mut tpl = sample("openai-compatible");
        storage.insert_template(&tpl).expect("insert");

        tpl.configuration = serde_json::json!({"models": ["large"]});
        tpl.updated_at = Utc::now();
        storage.update_template(&tpl).expect("update");

        let loaded = storage.get_template(&tpl.id).expect("get").expect("present");
        assert_eq!(loaded.configuration["models"][0], "large");
    }

    #[test]
    fn duplicate_handle_is_conflict() {
        let storage = PersistentStorage::open_in_memory().expect("open");
        storage.insert_template(&sample("dup")).expect("insert");
        let err = storage.insert_template(&sample("dup")).expect_err("dup");
        assert!(matches!(err, Error::Conflict(_)));
    }
}
