//! On-disk parsed-payload cache (§6 "Cache layout"): one JSON file per
//! source at `<cache_root>/<source_id>.json`, consumed by the Fetcher's
//! retry path so a source whose upstream is down can still refresh from
//! its last successful parse.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::models::{ParseOutput, ParsedGroupInfo, ParsedStream};
use crate::{Error, Result};

/// On-disk shape: `extinf_data` is the field name the upstream convention
/// uses regardless of which dialect produced the stream list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPayload {
    pub extinf_data: Vec<ParsedStream>,
    pub groups: std::collections::HashMap<String, ParsedGroupInfo>,
}

impl From<&ParseOutput> for CachedPayload {
    fn from(out: &ParseOutput) -> Self {
        Self {
            extinf_data: out.streams.clone(),
            groups: out.groups.clone(),
        }
    }
}

impl From<CachedPayload> for ParseOutput {
    fn from(payload: CachedPayload) -> Self {
        Self {
            streams: payload.extinf_data,
            groups: payload.groups,
        }
    }
}

/// Reads and writes `<cache_root>/<source_id>.json`.
pub struct RefreshCache {
    cache_root: PathBuf,
}

impl RefreshCache {
    #[must_use]
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    fn path_for(&self, source_id: &str) -> PathBuf {
        self.cache_root.join(format!("{source_id}.json"))
    }

    /// Persist a fresh parse for `source_id`, creating the cache root if
    /// needed. Called after a successful fetch+parse (§4.1).
    pub async fn store(&self, source_id: &str, output: &ParseOutput) -> Result<()> {
        fs::create_dir_all(&self.cache_root)
            .await
            .map_err(|e| Error::Internal(format!("creating cache root: {e}")))?;
        let payload = CachedPayload::from(output);
        let body = serde_json::to_vec_pretty(&payload).map_err(Error::Serialization)?;
        fs::write(self.path_for(source_id), body)
            .await
            .map_err(|e| Error::Internal(format!("writing cache file: {e}")))?;
        Ok(())
    }

    /// Load a previously cached parse, if one exists on disk.
    pub async fn load(&self, source_id: &str) -> Result<Option<ParseOutput>> {
        let path = self.path_for(source_id);
        if !fs::try_exists(&path)
            .await
            .map_err(|e| Error::Internal(format!("checking cache file: {e}")))?
        {
            return Ok(None);
        }
        let body = fs::read(&path)
            .await
            .map_err(|e| Error::Internal(format!("reading cache file: {e}")))?;
        let payload: CachedPayload = serde_json::from_slice(&body)
            .map_err(|e| Error::Deserialization { context: format!("cache file {}: {e}", path.display()) })?;
        Ok(Some(payload.into()))
    }

    #[must_use]
    pub fn exists_sync(&self, source_id: &str) -> bool {
        Path::new(&self.path_for(source_id)).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_GROUP;

    fn sample_output() -> ParseOutput {
        let mut out = ParseOutput::new();
        let mut attrs = std::collections::HashMap::new();
        attrs.insert("group-title".to_string(), DEFAULT_GROUP.to_string());
        out.streams.push(ParsedStream {
            name: "Sport HD".to_string(),
            url: "http://a.example/s1.ts".to_string(),
            attrs,
        });
        out
    }

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RefreshCache::new(dir.path());
        let output = sample_output();

        cache.store("src1", &output).await.unwrap();
        assert!(cache.exists_sync("src1"));

        let loaded = cache.load("src1").await.unwrap().unwrap();
        assert_eq!(loaded.streams.len(), 1);
        assert_eq!(loaded.streams[0].name, "Sport HD");
    }

    #[tokio::test]
    async fn missing_cache_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RefreshCache::new(dir.path());
        assert!(cache.load("nonexistent").await.unwrap().is_none());
    }
}
