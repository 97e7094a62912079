//! Knowledge resource resolution.
//!
//! The knowledge text has lived under several names over time. The loader walks
//! an ordered candidate list (configured path first, then conventional
//! fallbacks) and reports which physical file is active together with a content
//! digest, so an operator can tell from a single response what the model was
//! grounded on.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::KnowledgeConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeStatus {
    Ok,
    Empty,
    Missing,
}

impl KnowledgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Empty => "empty",
            Self::Missing => "missing",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KnowledgeResource {
    pub text: String,
    pub status: KnowledgeStatus,
    pub source_id: Option<String>,
    pub digest: String,
}

impl KnowledgeResource {
    pub fn missing() -> Self {
        Self {
            text: String::new(),
            status: KnowledgeStatus::Missing,
            source_id: None,
            digest: content_digest(""),
        }
    }

    pub fn from_source(source: &Path, text: String) -> Self {
        let source_id = Some(source.display().to_string());
        if text.trim().is_empty() {
            return Self {
                text: String::new(),
                status: KnowledgeStatus::Empty,
                source_id,
                digest: content_digest(""),
            };
        }

        let digest = content_digest(&text);
        Self { text, status: KnowledgeStatus::Ok, source_id, digest }
    }

    pub fn is_available(&self) -> bool {
        self.status == KnowledgeStatus::Ok
    }
}

/// Stable fingerprint of the knowledge text. Used for diagnostics and cache
/// checks only.
pub fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

#[derive(Debug)]
struct CacheEntry {
    path: PathBuf,
    modified: Option<SystemTime>,
    len: u64,
    resource: Arc<KnowledgeResource>,
}

impl CacheEntry {
    fn matches(&self, path: &Path, modified: Option<SystemTime>, len: u64) -> bool {
        self.path == path && self.modified == modified && self.len == len
    }
}

#[derive(Debug)]
pub struct KnowledgeLoader {
    candidates: Vec<PathBuf>,
    cache: RwLock<Option<CacheEntry>>,
}

impl KnowledgeLoader {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates, cache: RwLock::new(None) }
    }

    pub fn from_config(config: &KnowledgeConfig) -> Self {
        let mut candidates = Vec::with_capacity(config.fallbacks.len() + 1);
        if let Some(path) = &config.path {
            candidates.push(path.clone());
        }
        for fallback in &config.fallbacks {
            if !candidates.contains(fallback) {
                candidates.push(fallback.clone());
            }
        }
        Self::new(candidates)
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    pub async fn load(&self) -> Arc<KnowledgeResource> {
        for path in &self.candidates {
            let metadata = match fs::metadata(path).await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => {
                    debug!(
                        event_name = "knowledge.candidate.not_a_file",
                        path = %path.display(),
                        "skipping knowledge candidate"
                    );
                    continue;
                }
                Err(_) => continue,
            };
            let modified = metadata.modified().ok();
            let len = metadata.len();

            if let Some(resource) = self.cached(path, modified, len).await {
                return resource;
            }

            match fs::read_to_string(path).await {
                Ok(text) => {
                    let resource = Arc::new(KnowledgeResource::from_source(path, text));
                    info!(
                        event_name = "knowledge.loaded",
                        path = %path.display(),
                        status = resource.status.as_str(),
                        digest = %resource.digest,
                        "knowledge resource loaded"
                    );
                    self.store(CacheEntry {
                        path: path.clone(),
                        modified,
                        len,
                        resource: resource.clone(),
                    })
                    .await;
                    return resource;
                }
                Err(error) => {
                    warn!(
                        event_name = "knowledge.candidate.unreadable",
                        path = %path.display(),
                        error = %error,
                        "knowledge candidate exists but could not be read"
                    );
                }
            }
        }

        warn!(
            event_name = "knowledge.missing",
            candidates = self.candidates.len(),
            "no knowledge candidate could be resolved"
        );
        Arc::new(KnowledgeResource::missing())
    }

    async fn cached(
        &self,
        path: &Path,
        modified: Option<SystemTime>,
        len: u64,
    ) -> Option<Arc<KnowledgeResource>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|entry| entry.matches(path, modified, len))
            .map(|entry| entry.resource.clone())
    }

    async fn store(&self, entry: CacheEntry) {
        *self.cache.write().await = Some(entry);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::{content_digest, KnowledgeLoader, KnowledgeStatus};
    use crate::config::KnowledgeConfig;

    fn candidates(dir: &TempDir) -> Vec<PathBuf> {
        ["primary.txt", "legacy/ra_knowledge.txt", "knowledge.txt", "last.txt"]
            .iter()
            .map(|name| dir.path().join(name))
            .collect()
    }

    #[tokio::test]
    async fn resolves_first_existing_candidate_in_order() {
        let dir = TempDir::new().expect("tempdir");
        let paths = candidates(&dir);
        fs::write(&paths[2], "Livraison: 7 a 13 jours.").expect("write third");
        fs::write(&paths[3], "should never win").expect("write fourth");

        let loader = KnowledgeLoader::new(paths.clone());
        let resource = loader.load().await;

        assert_eq!(resource.status, KnowledgeStatus::Ok);
        assert_eq!(resource.source_id.as_deref(), Some(paths[2].display().to_string().as_str()));
        assert_eq!(resource.digest, content_digest("Livraison: 7 a 13 jours."));
        assert_eq!(resource.text, "Livraison: 7 a 13 jours.");
    }

    #[tokio::test]
    async fn reports_missing_when_no_candidate_exists() {
        let dir = TempDir::new().expect("tempdir");
        let loader = KnowledgeLoader::new(candidates(&dir));

        let resource = loader.load().await;

        assert_eq!(resource.status, KnowledgeStatus::Missing);
        assert_eq!(resource.text, "");
        assert_eq!(resource.source_id, None);
        assert_eq!(resource.digest, content_digest(""));
    }

    #[tokio::test]
    async fn whitespace_only_file_is_reported_empty() {
        let dir = TempDir::new().expect("tempdir");
        let paths = candidates(&dir);
        fs::write(&paths[0], "  \n\t\n").expect("write");

        let resource = KnowledgeLoader::new(paths.clone()).load().await;

        assert_eq!(resource.status, KnowledgeStatus::Empty);
        assert_eq!(resource.text, "");
        assert_eq!(resource.source_id.as_deref(), Some(paths[0].display().to_string().as_str()));
        assert_eq!(resource.digest, content_digest(""));
    }

    #[tokio::test]
    async fn directories_are_skipped() {
        let dir = TempDir::new().expect("tempdir");
        let paths = candidates(&dir);
        fs::create_dir_all(&paths[0]).expect("mkdir candidate");
        fs::write(&paths[3], "fallback").expect("write");

        let resource = KnowledgeLoader::new(paths.clone()).load().await;

        assert_eq!(resource.status, KnowledgeStatus::Ok);
        assert_eq!(resource.source_id.as_deref(), Some(paths[3].display().to_string().as_str()));
    }

    #[tokio::test]
    async fn cache_is_invalidated_when_file_changes() {
        let dir = TempDir::new().expect("tempdir");
        let paths = candidates(&dir);
        fs::write(&paths[0], "v1").expect("write v1");

        let loader = KnowledgeLoader::new(paths.clone());
        let first = loader.load().await;
        let again = loader.load().await;
        assert!(std::sync::Arc::ptr_eq(&first, &again), "unchanged file should hit the cache");

        // Length changes even if the filesystem mtime granularity is coarse.
        fs::write(&paths[0], "version two").expect("write v2");
        let second = loader.load().await;

        assert_eq!(second.text, "version two");
        assert_ne!(first.digest, second.digest);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_readers_never_observe_a_torn_resource() {
        let dir = TempDir::new().expect("tempdir");
        let paths = candidates(&dir);
        let versions: Vec<String> = (1..=20)
            .map(|round| format!("Version {round}: {}", "délais 7 à 13 jours. ".repeat(round)))
            .collect();
        fs::write(&paths[0], &versions[0]).expect("write first version");

        let loader = Arc::new(KnowledgeLoader::new(paths.clone()));

        let writer = {
            let target = paths[0].clone();
            let staging = dir.path().join("staging.txt");
            let versions = versions.clone();
            tokio::task::spawn_blocking(move || {
                for version in &versions[1..] {
                    fs::write(&staging, version).expect("write staging");
                    fs::rename(&staging, &target).expect("swap knowledge file");
                }
            })
        };

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let loader = Arc::clone(&loader);
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    for _ in 0..40 {
                        seen.push(loader.load().await);
                        tokio::task::yield_now().await;
                    }
                    seen
                })
            })
            .collect();

        writer.await.expect("writer task");
        for reader in readers {
            for resource in reader.await.expect("reader task") {
                assert_eq!(resource.digest, content_digest(&resource.text));
                assert_eq!(resource.status, KnowledgeStatus::Ok);
                assert!(versions.contains(&resource.text), "unexpected text {:?}", resource.text);
            }
        }

        let settled = loader.load().await;
        assert_eq!(settled.text, versions[versions.len() - 1]);
    }

    #[test]
    fn from_config_puts_explicit_path_first_without_duplicates() {
        let config = KnowledgeConfig {
            path: Some(PathBuf::from("knowledge/knowledge.txt")),
            fallbacks: vec![
                PathBuf::from("knowledge/knowledge.txt"),
                PathBuf::from("api/knowledge/ra_knowledge.txt"),
            ],
        };

        let loader = KnowledgeLoader::from_config(&config);

        assert_eq!(
            loader.candidates(),
            &[
                PathBuf::from("knowledge/knowledge.txt"),
                PathBuf::from("api/knowledge/ra_knowledge.txt"),
            ]
        );
    }
}
