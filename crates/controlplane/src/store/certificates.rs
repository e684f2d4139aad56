//! In-memory certificate index, loaded from storage at startup and
//! carried in every snapshot.

use std::collections::HashMap;

use parking_lot::RwLock;

use gatehouse_domain::model::StoredCertificate;
use gatehouse_domain::{Error, Result};

#[derive(Default)]
struct Inner {
    by_id: HashMap<String, StoredCertificate>,
    /// name → id
    by_name: HashMap<String, String>,
}

#[derive(Default)]
pub struct CertificateStore {
    inner: RwLock<Inner>,
}

impl CertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, cert: StoredCertificate) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.by_name.contains_key(&cert.name) {
            return Err(Error::Conflict(format!(
                "certificate {:?} already exists",
                cert.name
            )));
        }
        inner.by_name.insert(cert.name.clone(), cert.id.clone());
        inner.by_id.insert(cert.id.clone(), cert);
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<StoredCertificate> {
        let mut inner = self.inner.write();
        let cert = inner
            .by_id
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("certificate {id}")))?;
        inner.by_name.remove(&cert.name);
        Ok(cert)
    }

    pub fn get(&self, id: &str) -> Option<StoredCertificate> {
        self.inner.read().by_id.get(id).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<StoredCertificate> {
        let inner = self.inner.read();
        let id = inner.by_name.get(name)?;
        inner.by_id.get(id).cloned()
    }

    pub fn list(&self) -> Vec<StoredCertificate> {
        let inner = self.inner.read();
        let mut out: Vec<StoredCertificate> = inner.by_id.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn cert(name: &str) -> StoredCertificate {
        let now = Utc::now();
        StoredCertificate {
            id: format!("cert-{name}"),
            name: name.into(),
            certificate: b"pem".to_vec(),
            subject: "CN=x".into(),
            issuer: "CN=ca".into(),
            not_before: now,
            not_after: now,
            cert_count: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn name_uniqueness_and_lookup() {
        let store = CertificateStore::new();
        store.add(cert("tls")).expect("add");
        assert!(store.get_by_name("tls").is_some());

        let err = store.add(cert("tls")).expect_err("dup");
        assert!(matches!(err, Error::Conflict(_)));

        store.delete("cert-tls").expect("delete");
        assert!(store.get_by_name("tls").is_none());
    }
}
