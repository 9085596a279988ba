//! Core DocumentStore implementation

use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use fs2::FileExt;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the per-collection lock file
const LOCK_FILE: &str = ".lock";

/// Extension used for stored documents
const DOC_EXT: &str = "json";

/// Metadata for a stored document
#[derive(Debug, Clone)]
pub struct DocumentMeta {
    /// Document ID (file stem)
    pub id: String,
    /// Size on disk in bytes
    pub bytes: u64,
    /// Last modification time
    pub modified: Option<DateTime<Utc>>,
}

/// File-backed JSON document store
///
/// Documents live at `{base}/{collection}/{id}.json`. Writes go through a
/// temp file and an atomic rename while holding an exclusive lock on the
/// collection, so a reader never observes a half-written document.
pub struct DocumentStore {
    base_path: PathBuf,
}

impl DocumentStore {
    /// Open or create a document store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;
        debug!(?base_path, "Opened document store");
        Ok(Self { base_path })
    }

    /// Root directory of this store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Fetch a document, `None` if it does not exist
    pub fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let path = self.doc_path(collection, id)?;
        if !path.exists() {
            debug!(collection, id, "get: document not found");
            return Ok(None);
        }

        let _lock = self.lock(collection, false)?;
        let content = fs::read(&path).context(format!("Failed to read document: {}", path.display()))?;
        let value = serde_json::from_slice(&content).context(format!("Corrupt document: {}", path.display()))?;
        Ok(Some(value))
    }

    /// Create or replace a document
    pub fn put(&self, collection: &str, id: &str, doc: &Value) -> Result<()> {
        let path = self.doc_path(collection, id)?;
        let dir = self.collection_path(collection)?;
        fs::create_dir_all(&dir).context(format!("Failed to create collection: {}", collection))?;

        let _lock = self.lock(collection, true)?;
        let tmp_path = path.with_extension(format!("{}.tmp", DOC_EXT));
        {
            let mut file = fs::File::create(&tmp_path).context("Failed to create temp document")?;
            file.write_all(&serde_json::to_vec_pretty(doc)?)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path).context(format!("Failed to commit document: {}", path.display()))?;

        debug!(collection, id, "put: document written");
        Ok(())
    }

    /// Delete a document; returns whether it existed
    pub fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let path = self.doc_path(collection, id)?;
        if !path.exists() {
            return Ok(false);
        }

        let _lock = self.lock(collection, true)?;
        fs::remove_file(&path).context(format!("Failed to delete document: {}", path.display()))?;
        info!(collection, id, "Deleted document");
        Ok(true)
    }

    /// List documents of a collection, sorted by ID
    pub fn list(&self, collection: &str) -> Result<Vec<DocumentMeta>> {
        let dir = self.collection_path(collection)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut docs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == DOC_EXT).unwrap_or(false)
                && let Some(id) = path.file_stem().and_then(|s| s.to_str())
            {
                let meta = entry.metadata()?;
                docs.push(DocumentMeta {
                    id: id.to_string(),
                    bytes: meta.len(),
                    modified: meta.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }

        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }

    /// List all collection names
    pub fn collections(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if entry.path().is_dir()
                && let Some(name) = entry.file_name().to_str()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf> {
        validate_name(collection)?;
        Ok(self.base_path.join(collection))
    }

    fn doc_path(&self, collection: &str, id: &str) -> Result<PathBuf> {
        validate_name(id)?;
        Ok(self.collection_path(collection)?.join(format!("{}.{}", id, DOC_EXT)))
    }

    fn lock(&self, collection: &str, exclusive: bool) -> Result<CollectionLock> {
        let dir = self.collection_path(collection)?;
        fs::create_dir_all(&dir)?;
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join(LOCK_FILE))
            .context("Failed to open lock file")?;

        if exclusive {
            file.lock_exclusive().context("Failed to acquire exclusive lock")?;
        } else {
            file.lock_shared().context("Failed to acquire shared lock")?;
        }
        Ok(CollectionLock { file })
    }
}

/// Releases the collection lock on drop
struct CollectionLock {
    file: fs::File,
}

impl Drop for CollectionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Collection names and document IDs become path segments
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) || name.contains("..") {
        return Err(eyre::eyre!("Invalid document or collection name: {:?}", name));
    }
    Ok(())
}
