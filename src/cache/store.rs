//! On-disk content-addressable store
//!
//! Layout under the cache root:
//!
//! ```text
//! <root>/
//!   index/<sha256(key)[0..2]>/<sha256(key)[2..]>.json   entry records
//!   content/<algo>/<hex[0..2]>/<hex[2..4]>/<hex[4..]>    raw bytes, strongest hash only
//!   aliases/<algo>/<hex[0..2]>/<hex[2..4]>/<hex[4..]>    strongest hash of the same bytes
//! ```
//!
//! Content files are named by their digest, so writing identical bytes twice
//! is a no-op. Weaker hashes of an entry resolve through alias files rather
//! than another copy of the bytes. Every write goes to a temp file first and is renamed into
//! place, so readers never observe partial content.

use crate::cache::key::CacheKey;
use crate::error::{PkgcacheError, PkgcacheResult};
use crate::integrity::{Algorithm, Integrity, IntegrityHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

const INDEX_DIR: &str = "index";
const CONTENT_DIR: &str = "content";
const ALIAS_DIR: &str = "aliases";

/// Freshness and provenance hints recorded with an entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryMetadata {
    /// Where the bytes came from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Upstream `cache-control` header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// Upstream `age` header, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u64>,
    /// Media type of the stored bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// A stored entry, without its bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub integrity: Integrity,
    pub size: u64,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub metadata: EntryMetadata,
}

/// Options for [`ContentStore::put`]
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Expected integrity; the write fails if the bytes disagree
    pub integrity: Option<Integrity>,
    /// Extra algorithms to address the content by
    pub algorithms: Vec<Algorithm>,
    pub metadata: EntryMetadata,
}

/// Outcome of [`ContentStore::verify`]
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub checked: usize,
    /// Keys whose content no longer matches its digest
    pub corrupt: Vec<String>,
    /// Keys whose content file is gone
    pub missing: Vec<String>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.corrupt.is_empty() && self.missing.is_empty()
    }
}

/// Content-addressable store rooted at a cache directory
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Open a store; nothing is touched on disk until the first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find an entry by index key or by digest
    ///
    /// Index entries whose content has gone missing are reported as absent.
    pub async fn lookup(&self, key: &CacheKey) -> PkgcacheResult<Option<CacheEntry>> {
        match key {
            CacheKey::Index(key) => {
                let Some(entry) = self.read_index(key).await? else {
                    return Ok(None);
                };
                if self.has_content(&entry.integrity).await?.is_none() {
                    warn!("Index entry {} points at missing content", key);
                    return Ok(None);
                }
                Ok(Some(entry))
            }
            CacheKey::Digest(integrity) => {
                let Some(found) = self.has_content(integrity).await? else {
                    return Ok(None);
                };
                let Some(path) = self.locate(&found.hashes()[0]).await? else {
                    return Ok(None);
                };
                let meta = fs::metadata(&path)
                    .await
                    .map_err(|e| PkgcacheError::io(format!("reading {}", path.display()), e))?;
                let time = meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());

                Ok(Some(CacheEntry {
                    key: found.to_string(),
                    integrity: found,
                    size: meta.len(),
                    time,
                    metadata: EntryMetadata::default(),
                }))
            }
        }
    }

    /// The hashes of `integrity` whose content is present, if any
    pub async fn has_content(&self, integrity: &Integrity) -> PkgcacheResult<Option<Integrity>> {
        let mut present: Option<Integrity> = None;

        for hash in integrity.hashes() {
            if self.locate(hash).await?.is_some() {
                let single = Integrity::from_hash(hash.clone());
                present = Some(match present {
                    Some(acc) => acc.concat(&single),
                    None => single,
                });
            }
        }

        Ok(present)
    }

    /// Insert `data` under `key`
    ///
    /// The bytes are hashed with the default algorithm plus any requested
    /// or expected ones. A mismatch against `opts.integrity` fails before
    /// anything is written. If `key` already holds the same digest the
    /// existing entry is returned untouched.
    pub async fn put(&self, key: &str, data: &[u8], opts: PutOptions) -> PkgcacheResult<CacheEntry> {
        let mut algorithms = opts.algorithms.clone();
        algorithms.push(Algorithm::DEFAULT);
        if let Some(expected) = &opts.integrity {
            algorithms.extend(expected.algorithms());
        }
        let computed = Integrity::from_bytes(data, &algorithms);

        if let Some(expected) = &opts.integrity {
            if !computed.matches(expected) {
                return Err(PkgcacheError::IntegrityMismatch {
                    expected: expected.to_string(),
                    actual: computed.to_string(),
                });
            }
        }

        if let Some(existing) = self.read_index(key).await? {
            if existing.integrity.matches(&computed)
                && self.has_content(&existing.integrity).await?.is_some()
            {
                debug!("Entry {} already holds this content", key);
                return Ok(existing);
            }
        }

        let primary = computed
            .strongest()
            .ok_or_else(|| PkgcacheError::Internal(format!("no digest computed for {}", key)))?;
        let content = self.content_path(primary);
        if !exists(&content).await? {
            write_atomic(&content, data).await?;
        }
        for hash in computed.hashes().iter().filter(|hash| *hash != primary) {
            let alias = self.alias_path(hash);
            if !exists(&alias).await? {
                write_atomic(&alias, primary.to_string().as_bytes()).await?;
            }
        }

        let entry = CacheEntry {
            key: key.to_string(),
            integrity: computed,
            size: data.len() as u64,
            time: Utc::now(),
            metadata: opts.metadata,
        };
        let record = serde_json::to_vec_pretty(&entry)?;
        write_atomic(&self.index_path(key), &record).await?;

        info!("Cached {} ({} bytes)", key, entry.size);
        Ok(entry)
    }

    /// Read an entry and its bytes, verifying them on the way out
    pub async fn read(&self, key: &str) -> PkgcacheResult<Option<(CacheEntry, Vec<u8>)>> {
        let Some(entry) = self.read_index(key).await? else {
            return Ok(None);
        };
        Ok(self
            .read_content(&entry.integrity)
            .await?
            .map(|data| (entry, data)))
    }

    /// Read content by digest, strongest algorithm first
    pub async fn read_content(&self, integrity: &Integrity) -> PkgcacheResult<Option<Vec<u8>>> {
        let mut hashes: Vec<&IntegrityHash> = integrity.hashes().iter().collect();
        hashes.sort_by(|a, b| b.algorithm.cmp(&a.algorithm));

        for hash in hashes {
            let Some(path) = self.locate(hash).await? else {
                continue;
            };
            let data = match fs::read(&path).await {
                Ok(data) => data,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(PkgcacheError::io(format!("reading {}", path.display()), e));
                }
            };

            Integrity::from_hash(hash.clone())
                .verify(&data)
                .map_err(|_| PkgcacheError::CacheCorrupt {
                    key: hash.to_string(),
                    reason: "content does not match its digest".to_string(),
                })?;
            return Ok(Some(data));
        }

        Ok(None)
    }

    /// Every index entry, keyed by its logical key
    pub async fn list(&self) -> PkgcacheResult<BTreeMap<String, CacheEntry>> {
        let mut entries = BTreeMap::new();

        for bucket in subdirectories(&self.root.join(INDEX_DIR)).await? {
            let mut dir = fs::read_dir(&bucket)
                .await
                .map_err(|e| PkgcacheError::io(format!("reading {}", bucket.display()), e))?;

            while let Some(file) = dir
                .next_entry()
                .await
                .map_err(|e| PkgcacheError::io("reading index entry", e))?
            {
                let path = file.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    let entry = read_entry_file(&path).await?;
                    entries.insert(entry.key.clone(), entry);
                }
            }
        }

        debug!("Listed {} entries in {}", entries.len(), self.root.display());
        Ok(entries)
    }

    /// Remove the index entry for `key`; content files stay in place
    ///
    /// Returns whether an entry existed.
    pub async fn invalidate(&self, key: &str) -> PkgcacheResult<bool> {
        let path = self.index_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Invalidated {}", key);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PkgcacheError::io(format!("removing {}", path.display()), e)),
        }
    }

    /// Re-hash the content of every entry
    pub async fn verify(&self) -> PkgcacheResult<VerifyReport> {
        let mut report = VerifyReport::default();

        for (key, entry) in self.list().await? {
            report.checked += 1;
            match self.read_content(&entry.integrity).await {
                Ok(Some(_)) => {}
                Ok(None) => report.missing.push(key),
                Err(PkgcacheError::CacheCorrupt { .. }) => report.corrupt.push(key),
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    async fn read_index(&self, key: &str) -> PkgcacheResult<Option<CacheEntry>> {
        let path = self.index_path(key);
        if !exists(&path).await? {
            return Ok(None);
        }
        let entry = read_entry_file(&path).await?;
        // sha256 bucket collisions are possible in principle
        if entry.key != key {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn index_path(&self, key: &str) -> PathBuf {
        let hashed = hex::encode(Sha256::digest(key.as_bytes()));
        self.root
            .join(INDEX_DIR)
            .join(&hashed[..2])
            .join(format!("{}.json", &hashed[2..]))
    }

    /// Path of the bytes for `hash`, directly or through its alias
    async fn locate(&self, hash: &IntegrityHash) -> PkgcacheResult<Option<PathBuf>> {
        let direct = self.content_path(hash);
        if exists(&direct).await? {
            return Ok(Some(direct));
        }

        let alias = self.alias_path(hash);
        let target = match fs::read_to_string(&alias).await {
            Ok(target) => target,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PkgcacheError::io(format!("reading {}", alias.display()), e)),
        };
        let target = Integrity::parse(target.trim()).map_err(|_| PkgcacheError::CacheCorrupt {
            key: hash.to_string(),
            reason: format!("unreadable alias {}", alias.display()),
        })?;

        for primary in target.hashes() {
            let path = self.content_path(primary);
            if exists(&path).await? {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    fn content_path(&self, hash: &IntegrityHash) -> PathBuf {
        self.hash_path(CONTENT_DIR, hash)
    }

    fn alias_path(&self, hash: &IntegrityHash) -> PathBuf {
        self.hash_path(ALIAS_DIR, hash)
    }

    fn hash_path(&self, dir: &str, hash: &IntegrityHash) -> PathBuf {
        let hex = hash.hex_digest();
        self.root
            .join(dir)
            .join(hash.algorithm.as_str())
            .join(&hex[..2])
            .join(&hex[2..4])
            .join(&hex[4..])
    }
}

async fn exists(path: &Path) -> PkgcacheResult<bool> {
    fs::try_exists(path)
        .await
        .map_err(|e| PkgcacheError::io(format!("checking {}", path.display()), e))
}

async fn read_entry_file(path: &Path) -> PkgcacheResult<CacheEntry> {
    let content = fs::read(path)
        .await
        .map_err(|e| PkgcacheError::io(format!("reading {}", path.display()), e))?;
    serde_json::from_slice(&content).map_err(|e| PkgcacheError::CacheCorrupt {
        key: path.display().to_string(),
        reason: e.to_string(),
    })
}

async fn subdirectories(dir: &Path) -> PkgcacheResult<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PkgcacheError::io(format!("reading {}", dir.display()), e)),
    };

    let mut dirs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PkgcacheError::io(format!("reading {}", dir.display()), e))?
    {
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if is_dir {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

async fn write_atomic(path: &Path, data: &[u8]) -> PkgcacheResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| PkgcacheError::Internal(format!("{} has no parent", path.display())))?;
    fs::create_dir_all(parent)
        .await
        .map_err(|e| PkgcacheError::io(format!("creating {}", parent.display()), e))?;

    let tmp = parent.join(format!(".tmp-{}", Uuid::new_v4()));
    fs::write(&tmp, data)
        .await
        .map_err(|e| PkgcacheError::io(format!("writing {}", tmp.display()), e))?;

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(PkgcacheError::io(
            format!("moving {} into place", path.display()),
            e,
        ));
    }
    Ok(())
}
