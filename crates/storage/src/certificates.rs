//! The `certificates` table: PEM bundles plus caller-supplied metadata.

use rusqlite::{params, OptionalExtension};

use gatehouse_domain::model::StoredCertificate;
use gatehouse_domain::{Error, Result};

use crate::{map_sqlite_err, parse_dt, PersistentStorage};

struct CertificateRow {
    id: String,
    name: String,
    certificate: Vec<u8>,
    subject: String,
    issuer: String,
    not_before: String,
    not_after: String,
    cert_count: i64,
    created_at: String,
    updated_at: String,
}

const SELECT_COLUMNS: &str =
    "id, name, certificate, subject, issuer, not_before, not_after, cert_count,
     created_at, updated_at";

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<CertificateRow> {
    Ok(CertificateRow {
        id: row.get(0)?,
        name: row.get(1)?,
        certificate: row.get(2)?,
        subject: row.get(3)?,
        issuer: row.get(4)?,
        not_before: row.get(5)?,
        not_after: row.get(6)?,
        cert_count: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn raw_to_cert(raw: CertificateRow) -> Result<StoredCertificate> {
    Ok(StoredCertificate {
        id: raw.id,
        name: raw.name,
        certificate: raw.certificate,
        subject: raw.subject,
        issuer: raw.issuer,
        not_before: parse_dt(&raw.not_before)?,
        not_after: parse_dt(&raw.not_after)?,
        cert_count: raw.cert_count,
        created_at: parse_dt(&raw.created_at)?,
        updated_at: parse_dt(&raw.updated_at)?,
    })
}

impl PersistentStorage {
    pub fn insert_certificate(&self, cert: &StoredCertificate) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO certificates
                 (id, name, certificate, subject, issuer, not_before, not_after,
                  cert_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                cert.id,
                cert.name,
                cert.certificate,
                cert.subject,
                cert.issuer,
                cert.not_before.to_rfc3339(),
                cert.not_after.to_rfc3339(),
                cert.cert_count,
                cert.created_at.to_rfc3339(),
                cert.updated_at.to_rfc3339(),
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn delete_certificate(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute("DELETE FROM certificates WHERE id = ?1", params![id])
            .map_err(map_sqlite_err)?;
        if changed == 0 {
            return Err(Error::NotFound(format!("certificate {id}")));
        }
        Ok(())
    }

    pub fn get_certificate_by_name(&self, name: &str) -> Result<Option<StoredCertificate>> {
        let conn = self.conn()?;
        let raw = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM certificates WHERE name = ?1"
            ))
            .map_err(map_sqlite_err)?
            .query_row(params![name], row_to_raw)
            .optional()
            .map_err(map_sqlite_err)?;
        raw.map(raw_to_cert).transpose()
    }

    pub fn load_certificates(&self) -> Result<Vec<StoredCertificate>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM certificates ORDER BY name"
            ))
            .map_err(map_sqlite_err)?;
        let rows = stmt.query_map([], row_to_raw).map_err(map_sqlite_err)?;

        let mut out = Vec::new();
        for raw in rows {
            out.push(raw_to_cert(raw.map_err(map_sqlite_err)?)?);
        }
        Ok(out)
    }
}
