//! Deployment rows: the `deployments` table plus the `deployment_configs`
//! side table holding the (potentially large) configuration documents.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use gatehouse_domain::model::{ConfigKind, DeploymentStatus, StoredConfig};
use gatehouse_domain::{Error, Result};

use crate::{map_sqlite_err, parse_dt, parse_opt_dt, PersistentStorage};

/// Raw row halves before type conversion.
struct DeploymentRow {
    id: String,
    display_name: String,
    version: String,
    context: Option<String>,
    kind: String,
    handle: String,
    status: String,
    created_at: String,
    updated_at: String,
    deployed_at: Option<String>,
    deployed_version: i64,
    configuration: String,
    source_configuration: String,
}

const SELECT_COLUMNS: &str = "d.id, d.display_name, d.version, d.context, d.kind, d.handle,
     d.status, d.created_at, d.updated_at, d.deployed_at, d.deployed_version,
     c.configuration, c.source_configuration";

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeploymentRow> {
    Ok(DeploymentRow {
        id: row.get(0)?,
        display_name: row.get(1)?,
        version: row.get(2)?,
        context: row.get(3)?,
        kind: row.get(4)?,
        handle: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        deployed_at: row.get(9)?,
        deployed_version: row.get(10)?,
        configuration: row.get(11)?,
        source_configuration: row.get(12)?,
    })
}

fn raw_to_config(raw: DeploymentRow) -> Result<StoredConfig> {
    let kind = ConfigKind::parse(&raw.kind)
        .ok_or_else(|| Error::Internal(format!("unknown kind {:?} in database", raw.kind)))?;
    let status = DeploymentStatus::parse(&raw.status)
        .ok_or_else(|| Error::Internal(format!("unknown status {:?} in database", raw.status)))?;
    let source_configuration = serde_json::from_str(&raw.source_configuration)?;

    Ok(StoredConfig {
        id: raw.id,
        handle: raw.handle,
        kind,
        display_name: raw.display_name,
        version: raw.version,
        context: raw.context,
        configuration: serde_json::from_str(&raw.configuration)?,
        source_configuration,
        status,
        created_at: parse_dt(&raw.created_at)?,
        updated_at: parse_dt(&raw.updated_at)?,
        deployed_at: parse_opt_dt(raw.deployed_at)?,
        deployed_version: raw.deployed_version,
        labels: Default::default(),
    })
}

impl PersistentStorage {
    /// Insert a new deployment and its configuration documents in one
    /// transaction. A handle or (display_name, version) collision surfaces
    /// as `Conflict`.
    pub fn insert_deployment(&self, cfg: &StoredConfig) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(map_sqlite_err)?;
        tx.execute(
            "INSERT INTO deployments
                 (id, display_name, version, context, kind, handle, status,
                  created_at, updated_at, deployed_at, deployed_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                cfg.id,
                cfg.display_name,
                cfg.version,
                cfg.context,
                cfg.kind.as_str(),
                cfg.handle,
                cfg.status.as_str(),
                cfg.created_at.to_rfc3339(),
                cfg.updated_at.to_rfc3339(),
                cfg.deployed_at.map(|t| t.to_rfc3339()),
                cfg.deployed_version,
            ],
        )
        .map_err(map_sqlite_err)?;
        tx.execute(
            "INSERT INTO deployment_configs (id, configuration, source_configuration)
             VALUES (?1, ?2, ?3)",
            params![
                cfg.id,
                serde_json::to_string(&cfg.configuration)?,
                serde_json::to_string(&cfg.source_configuration)?,
            ],
        )
        .map_err(map_sqlite_err)?;
        tx.commit().map_err(map_sqlite_err)
    }

    /// Replace an existing deployment. `NotFound` when the id is absent.
    pub fn update_deployment(&self, cfg: &StoredConfig) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(map_sqlite_err)?;
        let changed = tx
            .execute(
                "UPDATE deployments SET
                     display_name = ?2, version = ?3, context = ?4, kind = ?5,
                     handle = ?6, status = ?7, created_at = ?8, updated_at = ?9,
                     deployed_at = ?10, deployed_version = ?11
                 WHERE id = ?1",
                params![
                    cfg.id,
                    cfg.display_name,
                    cfg.version,
                    cfg.context,
                    cfg.kind.as_str(),
                    cfg.handle,
                    cfg.status.as_str(),
                    cfg.created_at.to_rfc3339(),
                    cfg.updated_at.to_rfc3339(),
                    cfg.deployed_at.map(|t| t.to_rfc3339()),
                    cfg.deployed_version,
                ],
            )
            .map_err(map_sqlite_err)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("deployment {}", cfg.id)));
        }
        tx.execute(
            "UPDATE deployment_configs SET configuration = ?2, source_configuration = ?3
             WHERE id = ?1",
            params![
                cfg.id,
                serde_json::to_string(&cfg.configuration)?,
                serde_json::to_string(&cfg.source_configuration)?,
            ],
        )
        .map_err(map_sqlite_err)?;
        tx.commit().map_err(map_sqlite_err)
    }

    /// Delete a deployment. API keys and configuration documents cascade.
    pub fn delete_deployment(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute("DELETE FROM deployments WHERE id = ?1", params![id])
            .map_err(map_sqlite_err)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("deployment {id}")));
        }
        Ok(())
    }

    pub fn get_deployment(&self, id: &str) -> Result<Option<StoredConfig>> {
        let conn = self.conn()?;
        let raw = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS}
                 FROM deployments d JOIN deployment_configs c ON c.id = d.id
                 WHERE d.id = ?1"
            ))
            .map_err(map_sqlite_err)?
            .query_row(params![id], row_to_raw)
            .optional()
            .map_err(map_sqlite_err)?;
        raw.map(raw_to_config).transpose()
    }

    /// Everything in the table, for the startup re-import.
    pub fn load_deployments(&self) -> Result<Vec<StoredConfig>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS}
                 FROM deployments d JOIN deployment_configs c ON c.id = d.id
                 ORDER BY d.created_at"
            ))
            .map_err(map_sqlite_err)?;
        let rows = stmt.query_map([], row_to_raw).map_err(map_sqlite_err)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(raw_to_config(raw.map_err(map_sqlite_err)?)?);
        }
        Ok(out)
    }

    /// Status update driven by the snapshot callback. Missing rows are not
    /// an error here; the record may have been deleted in-flight.
    pub fn set_deployment_status(
        &self,
        id: &str,
        status: DeploymentStatus,
        deployed_at: Option<DateTime<Utc>>,
        deployed_version: i64,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE deployments SET status = ?2, deployed_at = ?3, deployed_version = ?4
             WHERE id = ?1",
            params![
                id,
                status.as_str(),
                deployed_at.map(|t| t.to_rfc3339()),
                deployed_version,
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::tests_support::sample_deployment as sample;
    use super::*;

    #[test]
    fn insert_then_get_roundtrips() {
        let storage = PersistentStorage::open_in_memory().expect("open");
        let cfg = sample("orders-1", "Orders", "1.0.0");
        storage.insert_deployment(&cfg).expect("insert");

        let loaded = storage
            .get_deployment(&cfg.id)
            .expect("get")
            .expect("present");
        assert_eq!(loaded.handle, "orders-1");
        assert_eq!(loaded.display_name, "Orders");
        assert_eq!(loaded.status, DeploymentStatus::Pending);
        assert_eq!(loaded.source_configuration, cfg.source_configuration);
    }

    #[test]
    fn duplicate_handle_is_conflict() {
        let storage = PersistentStorage::open_in_memory().expect("open");
        storage
            .insert_deployment(&sample("orders-1", "Orders", "1.0.0"))
            .expect("insert");
        let err = storage
            .insert_deployment(&sample("orders-1", "Other", "2.0.0"))
            .expect_err("conflict");
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn duplicate_name_version_is_conflict() {
        let storage = PersistentStorage::open_in_memory().expect("open");
        storage
            .insert_deployment(&sample("orders-1", "Orders", "1.0.0"))
            .expect("insert");
        let err = storage
            .insert_deployment(&sample("orders-2", "Orders", "1.0.0"))
            .expect_err("conflict");
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn delete_missing_is_not_found() {
        let storage = PersistentStorage::open_in_memory().expect("open");
        let err = storage.delete_deployment("nope").expect_err("missing");
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn status_update_is_visible() {
        let storage = PersistentStorage::open_in_memory().expect("open");
        let cfg = sample("orders-1", "Orders", "1.0.0");
        storage.insert_deployment(&cfg).expect("insert");

        let deployed_at = Utc::now();
        storage
            .set_deployment_status(&cfg.id, DeploymentStatus::Deployed, Some(deployed_at), 7)
            .expect("set status");
        let loaded = storage
            .get_deployment(&cfg.id)
            .expect("get")
            .expect("present");
        assert_eq!(loaded.status, DeploymentStatus::Deployed);
        assert_eq!(loaded.deployed_version, 7);
        assert!(loaded.deployed_at.is_some());
    }
}
