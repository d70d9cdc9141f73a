use std::path::Path;

use anyhow::{Result, bail};
use async_trait::async_trait;
use fjall::Keyspace;
use tokio::task;
use uuid::Uuid;

use super::{AuditEntry, AuditSink};

/// Append-only audit log in a fjall keyspace, keyed by request id
pub struct FjallAuditSink {
    store: Keyspace,
}

fn get_from_store(store: Keyspace, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

impl FjallAuditSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path).open()?;
        let items = db.keyspace("audit", fjall::KeyspaceCreateOptions::default)?;
        Ok(FjallAuditSink { store: items })
    }

    /// Look up a previously recorded request.
    ///
    /// The request path only writes; this is the read side for offline
    /// analysis of recorded recommendations.
    #[tracing::instrument(name = "query_audit", level = "debug", skip(self))]
    pub async fn get(&self, request_id: &Uuid) -> Result<Option<AuditEntry>> {
        let store = self.store.clone();
        let key = request_id.as_bytes().to_vec();

        let maybe_bytes = task::spawn_blocking(move || get_from_store(store, key)).await??;
        match maybe_bytes {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AuditSink for FjallAuditSink {
    #[tracing::instrument(name = "put_audit", level = "debug", skip_all, fields(request_id = %entry.request_id))]
    async fn record(&self, entry: &AuditEntry) -> Result<()> {
        let store = self.store.clone();
        let request_id = entry.request_id;
        let key = request_id.as_bytes().to_vec();
        let bytes = postcard::to_stdvec(entry)?;

        task::spawn_blocking(move || -> Result<()> {
            // Entries are write-once
            if store.get(&key)?.is_some() {
                bail!("Audit entry {request_id} already exists");
            }
            store.insert(key, bytes)?;
            Ok(())
        })
        .await??;
        tracing::debug!("Audit entry stored");
        Ok(())
    }
}
