//! Forward-only schema migrations. The schema version lives in SQLite's
//! `user_version` pragma, managed by `rusqlite_migration`.

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use gatehouse_domain::{Error, Result};

pub fn migrate(conn: &mut Connection) -> Result<()> {
    migrations()
        .to_latest(conn)
        .map_err(|e| Error::DatabaseUnavailable(format!("migrating schema: {e}")))
}

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "CREATE TABLE deployments (
                id TEXT PRIMARY KEY NOT NULL,
                display_name TEXT NOT NULL,
                version TEXT NOT NULL,
                context TEXT,
                kind TEXT NOT NULL,
                handle TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL CHECK (status IN ('pending','deployed','failed')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deployed_at TEXT,
                deployed_version INTEGER NOT NULL DEFAULT 0,
                UNIQUE(display_name, version)
            );

            CREATE TABLE deployment_configs (
                id TEXT PRIMARY KEY NOT NULL REFERENCES deployments(id) ON DELETE CASCADE,
                configuration TEXT NOT NULL,
                source_configuration TEXT NOT NULL
            );

            CREATE TABLE certificates (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL UNIQUE,
                certificate BLOB NOT NULL,
                subject TEXT NOT NULL,
                issuer TEXT NOT NULL,
                not_before TEXT NOT NULL,
                not_after TEXT NOT NULL,
                cert_count INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE llm_provider_templates (
                id TEXT PRIMARY KEY NOT NULL,
                handle TEXT NOT NULL UNIQUE,
                configuration TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX idx_deployments_handle ON deployments(handle);
            CREATE INDEX idx_deployments_name_version ON deployments(display_name, version);
            CREATE INDEX idx_deployments_kind ON deployments(kind);
            CREATE INDEX idx_certificates_name ON certificates(name);
            CREATE INDEX idx_templates_handle ON llm_provider_templates(handle);
            ",
        ),
        M::up(
            "CREATE TABLE api_keys (
                id TEXT PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                api_key TEXT NOT NULL UNIQUE,
                masked_api_key TEXT NOT NULL,
                apiId TEXT NOT NULL REFERENCES deployments(id) ON DELETE CASCADE,
                operations TEXT NOT NULL DEFAULT '[\"*\"]',
                status TEXT NOT NULL CHECK (status IN ('active','revoked','expired')) DEFAULT 'active',
                created_at TEXT NOT NULL,
                created_by TEXT NOT NULL DEFAULT 'system',
                updated_at TEXT NOT NULL,
                expires_at TEXT,
                expires_in_unit TEXT,
                expires_in_duration INTEGER,
                UNIQUE(apiId, name)
            );

            CREATE INDEX idx_api_keys_api ON api_keys(apiId);
            ",
        ),
        // External-key support arrived later: provenance columns plus the
        // fingerprint used for O(1) data-plane lookup.
        M::up(
            "ALTER TABLE api_keys ADD COLUMN source TEXT NOT NULL DEFAULT 'local';
            ALTER TABLE api_keys ADD COLUMN external_ref_id TEXT;
            ALTER TABLE api_keys ADD COLUMN index_key TEXT;
            ALTER TABLE api_keys ADD COLUMN display_name TEXT NOT NULL DEFAULT '';

            CREATE INDEX idx_api_keys_index_key ON api_keys(apiId, index_key);
            ",
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_valid() {
        migrations().validate().expect("migrations validate");
    }

    #[test]
    fn migrate_fresh_database() {
        let mut conn = Connection::open_in_memory().expect("open");
        migrate(&mut conn).expect("migrate");

        // All tables exist after migration.
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('deployments','deployment_configs','certificates',
                  'llm_provider_templates','api_keys')",
                [],
                |row| row.get(0),
            )
            .expect("query");
        assert_eq!(count, 5);
    }
}
