// SPDX-License-Identifier: MIT OR Apache-2.0
//! Content-addressed document store (C1).
//!
//! Writing bytes returns the existing `doc_hash` when present — there is
//! no rewrite path and no mutation path. Visibility is enforced per
//! [`CompanyDocumentLink`](compliance_core::CompanyDocumentLink), never at
//! tenant granularity: a query must never return a document that is not
//! explicitly linked to the calling company.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use async_trait::async_trait;
use compliance_core::{DocHash, Document};
use compliance_error::{ComplianceError, ErrorKind, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Outcome of a [`DocumentStore::put`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    /// Content hash of the written bytes.
    pub doc_hash: DocHash,
    /// `true` if identical bytes were already present (no bytes were
    /// rewritten).
    pub duplicate: bool,
}

/// Content-addressed, append-only document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store `bytes`, deduplicating by content hash. Idempotent: writing
    /// the same bytes twice, even concurrently, is a no-op on the second
    /// write.
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<PutOutcome>;

    /// Fetch the original bytes for `doc_hash`.
    ///
    /// # Errors
    ///
    /// `ErrorKind::NotFound` if unknown. `ErrorKind::Integrity` if the
    /// stored bytes no longer hash to `doc_hash`.
    async fn get(&self, doc_hash: &str) -> Result<Vec<u8>>;

    /// Fetch document metadata without its bytes.
    async fn metadata(&self, doc_hash: &str) -> Result<Document>;

    /// Stamp the parser version of the most recent successful extraction.
    async fn set_parser_version(&self, doc_hash: &str, parser_version: &str) -> Result<()>;

    /// Grant `company_id` (under `tenant_id`) retrieval access to `doc_hash`.
    async fn link(&self, tenant_id: Uuid, company_id: Uuid, doc_hash: &str) -> Result<()>;

    /// `true` iff `doc_hash` is linked to `company_id` under `tenant_id`.
    /// Cross-tenant isolation (testable property 9): a link created under
    /// one tenant is never visible under another, even for the same
    /// `company_id` value.
    async fn is_linked(&self, tenant_id: Uuid, company_id: Uuid, doc_hash: &str) -> Result<bool>;

    /// All documents linked to `company_id` under `tenant_id`, ordered by
    /// `doc_hash` ascending (never storage-insertion order).
    async fn linked_documents(&self, tenant_id: Uuid, company_id: Uuid) -> Result<Vec<DocHash>>;
}

/// Filesystem-backed [`DocumentStore`]: bytes live under `root/bytes/<hash>`,
/// metadata and links are kept in memory and are not persisted across
/// process restarts (sufficient for the deterministic pipeline's needs —
/// a real deployment would back this with the relational store, per §1).
pub struct FsDocumentStore {
    root: PathBuf,
    metadata: Arc<RwLock<HashMap<DocHash, Document>>>,
    links: Arc<RwLock<HashSet<(Uuid, Uuid, DocHash)>>>,
}

impl FsDocumentStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            metadata: Arc::new(RwLock::new(HashMap::new())),
            links: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    fn bytes_path(&self, doc_hash: &str) -> PathBuf {
        self.root.join("bytes").join(doc_hash)
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<PutOutcome> {
        let doc_hash = compliance_canon::sha256_hex(&bytes);

        {
            let meta = self.metadata.read().await;
            if meta.contains_key(&doc_hash) {
                return Ok(PutOutcome {
                    doc_hash,
                    duplicate: true,
                });
            }
        }

        let path = self.bytes_path(&doc_hash);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ComplianceError::new(ErrorKind::Dependency, "create document store directory")
                    .with_source(e)
            })?;
        }
        tokio::fs::write(&path, &bytes).await.map_err(|e| {
            ComplianceError::new(ErrorKind::Dependency, "write document bytes").with_source(e)
        })?;

        let doc = Document {
            doc_hash: doc_hash.clone(),
            size: bytes.len() as u64,
            content_type: content_type.to_string(),
            parser_version: None,
        };
        self.metadata.write().await.insert(doc_hash.clone(), doc);

        tracing::info!(doc_hash = %doc_hash, size = bytes.len(), "document ingested");

        Ok(PutOutcome {
            doc_hash,
            duplicate: false,
        })
    }

    async fn get(&self, doc_hash: &str) -> Result<Vec<u8>> {
        if !self.metadata.read().await.contains_key(doc_hash) {
            return Err(ComplianceError::new(ErrorKind::NotFound, "document not found")
                .with_context("doc_hash", doc_hash));
        }
        let path = self.bytes_path(doc_hash);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            ComplianceError::new(ErrorKind::Dependency, "read document bytes").with_source(e)
        })?;

        let rehashed = compliance_canon::sha256_hex(&bytes);
        if rehashed != doc_hash {
            return Err(ComplianceError::new(
                ErrorKind::Integrity,
                "stored bytes no longer match their content hash",
            )
            .with_context("doc_hash", doc_hash)
            .with_context("rehashed", &rehashed));
        }
        Ok(bytes)
    }

    async fn metadata(&self, doc_hash: &str) -> Result<Document> {
        self.metadata
            .read()
            .await
            .get(doc_hash)
            .cloned()
            .ok_or_else(|| {
                ComplianceError::new(ErrorKind::NotFound, "document not found")
                    .with_context("doc_hash", doc_hash)
            })
    }

    async fn set_parser_version(&self, doc_hash: &str, parser_version: &str) -> Result<()> {
        let mut meta = self.metadata.write().await;
        let doc = meta.get_mut(doc_hash).ok_or_else(|| {
            ComplianceError::new(ErrorKind::NotFound, "document not found")
                .with_context("doc_hash", doc_hash)
        })?;
        doc.parser_version = Some(parser_version.to_string());
        Ok(())
    }

    async fn link(&self, tenant_id: Uuid, company_id: Uuid, doc_hash: &str) -> Result<()> {
        if !self.metadata.read().await.contains_key(doc_hash) {
            return Err(ComplianceError::new(ErrorKind::NotFound, "document not found")
                .with_context("doc_hash", doc_hash));
        }
        self.links
            .write()
            .await
            .insert((tenant_id, company_id, doc_hash.to_string()));
        Ok(())
    }

    async fn is_linked(&self, tenant_id: Uuid, company_id: Uuid, doc_hash: &str) -> Result<bool> {
        Ok(self
            .links
            .read()
            .await
            .contains(&(tenant_id, company_id, doc_hash.to_string())))
    }

    async fn linked_documents(&self, tenant_id: Uuid, company_id: Uuid) -> Result<Vec<DocHash>> {
        let links = self.links.read().await;
        let mut out: BTreeSet<DocHash> = BTreeSet::new();
        for (t, c, hash) in links.iter() {
            if *t == tenant_id && *c == company_id {
                out.insert(hash.clone());
            }
        }
        Ok(out.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> FsDocumentStore {
        let dir = tempfile::tempdir().unwrap();
        FsDocumentStore::new(dir.keep())
    }

    #[tokio::test]
    async fn put_dedupes_identical_bytes() {
        let s = store().await;
        let a = s.put(b"hello".to_vec(), "text/plain").await.unwrap();
        let b = s.put(b"hello".to_vec(), "text/plain").await.unwrap();
        assert_eq!(a.doc_hash, b.doc_hash);
        assert!(!a.duplicate);
        assert!(b.duplicate);
    }

    #[tokio::test]
    async fn get_returns_original_bytes() {
        let s = store().await;
        let put = s.put(b"hello world".to_vec(), "text/plain").await.unwrap();
        let bytes = s.get(&put.doc_hash).await.unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[tokio::test]
    async fn get_unknown_hash_is_not_found() {
        let s = store().await;
        let err = s.get("deadbeef").await.unwrap_err();
        assert_eq!(err.kind, compliance_error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn visibility_is_company_scoped_not_tenant_wide() {
        let s = store().await;
        let put = s.put(b"doc".to_vec(), "text/plain").await.unwrap();
        let tenant = Uuid::new_v4();
        let company_a = Uuid::new_v4();
        let company_b = Uuid::new_v4();
        s.link(tenant, company_a, &put.doc_hash).await.unwrap();

        assert!(s.is_linked(tenant, company_a, &put.doc_hash).await.unwrap());
        assert!(!s.is_linked(tenant, company_b, &put.doc_hash).await.unwrap());
    }

    #[tokio::test]
    async fn cross_tenant_isolation() {
        let s = store().await;
        let put = s.put(b"doc".to_vec(), "text/plain").await.unwrap();
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let company = Uuid::new_v4();
        s.link(tenant_a, company, &put.doc_hash).await.unwrap();

        assert!(s.is_linked(tenant_a, company, &put.doc_hash).await.unwrap());
        assert!(!s.is_linked(tenant_b, company, &put.doc_hash).await.unwrap());
        assert!(s
            .linked_documents(tenant_b, company)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn linked_documents_are_sorted() {
        let s = store().await;
        let tenant = Uuid::new_v4();
        let company = Uuid::new_v4();
        let a = s.put(b"aaa".to_vec(), "text/plain").await.unwrap();
        let b = s.put(b"bbb".to_vec(), "text/plain").await.unwrap();
        s.link(tenant, company, &a.doc_hash).await.unwrap();
        s.link(tenant, company, &b.doc_hash).await.unwrap();

        let docs = s.linked_documents(tenant, company).await.unwrap();
        let mut sorted = docs.clone();
        sorted.sort();
        assert_eq!(docs, sorted);
    }
}
