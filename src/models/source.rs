//! Source: a subscription to one upstream IPTV provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{SourceId, UrlRewriteRule};

/// The two upstream wire dialects a source can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Line-oriented `#EXTM3U` / `#EXTINF:` playlist text.
    Playlist,
    /// JSON-over-HTTP `player_api.php` catalog.
    Catalog,
}

/// Lifecycle / last-refresh-outcome status of a `Source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Idle,
    Fetching,
    Parsing,
    PendingSetup,
    Success,
    Error,
    Disabled,
}

impl SourceStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::PendingSetup => "pending_setup",
            Self::Success => "success",
            Self::Error => "error",
            Self::Disabled => "disabled",
        }
    }

    #[must_use]
    pub fn from_str_lenient(s: &str) -> Self {
        match s {
            "fetching" => Self::Fetching,
            "parsing" => Self::Parsing,
            "pending_setup" => Self::PendingSetup,
            "success" => Self::Success,
            "error" => Self::Error,
            "disabled" => Self::Disabled,
            _ => Self::Idle,
        }
    }
}

/// One or more candidate base URLs (ordered; multi-URL enables failover),
/// or a local file path to read instead of performing HTTP fetches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceEndpoint {
    pub urls: Vec<String>,
    pub local_file_path: Option<String>,
}

/// A regex filter entry applied during stream upsert (playlist dialect only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Name,
    Url,
    Group,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamFilter {
    pub field: FilterField,
    pub pattern: String,
    pub exclude: bool,
    pub case_sensitive: bool,
}

/// A subscription to one upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    pub kind: SourceKind,
    pub endpoint: SourceEndpoint,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_agent: Option<String>,
    pub refresh_interval_hours: u32,
    pub enabled: bool,
    pub retention_days: u32,
    pub status: SourceStatus,
    pub last_message: String,
    pub filters: Vec<StreamFilter>,
    /// Custom options bag; notably `vod_enabled`.
    pub options: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    #[must_use]
    pub fn vod_enabled(&self) -> bool {
        self.options
            .get("vod_enabled")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn effective_user_agent(&self) -> &str {
        self.user_agent
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("Mozilla/5.0 (compatible; catalog-core/1.0)")
    }

    /// Ordered playback URL rewrite rules carried in the options bag under
    /// `url_rewrite_rules`; malformed entries are skipped rather than
    /// failing the whole refresh.
    #[must_use]
    pub fn url_rewrite_rules(&self) -> Vec<UrlRewriteRule> {
        self.options
            .get("url_rewrite_rules")
            .and_then(serde_json::Value::as_array)
            .map(|rules| {
                rules
                    .iter()
                    .filter_map(|r| serde_json::from_value(r.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_source(options: JsonValue) -> Source {
        Source {
            id: SourceId::new(),
            name: "s".to_string(),
            kind: SourceKind::Catalog,
            endpoint: SourceEndpoint::default(),
            username: None,
            password: None,
            user_agent: None,
            refresh_interval_hours: 24,
            enabled: true,
            retention_days: 7,
            status: SourceStatus::Idle,
            last_message: String::new(),
            filters: Vec::new(),
            options,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn url_rewrite_rules_parses_ordered_entries() {
        let source = sample_source(serde_json::json!({
            "url_rewrite_rules": [
                { "search": "^http://old/(.*)$", "replace": "http://new/$1" },
            ],
        }));
        let rules = source.url_rewrite_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].replace, "http://new/$1");
    }

    #[test]
    fn url_rewrite_rules_empty_without_the_key() {
        let source = sample_source(serde_json::json!({}));
        assert!(source.url_rewrite_rules().is_empty());
    }
}
