//! Catalog dialect (§4.1, §4.2, §6): JSON-over-HTTP `player_api.php` wire
//! types. Kept distinct from `ParsedStream` — these are the raw upstream
//! shapes before normalization; `service::parser::parse_catalog` converts
//! them into the uniform internal record.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// `authenticate` response: `{user_info, server_info}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogAuthResponse {
    pub user_info: CatalogUserInfo,
    #[serde(default)]
    pub server_info: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogUserInfo {
    /// Upstream typically returns `"Active"`/`"Disabled"` or `"0"`/`"1"` —
    /// tolerate either by reading it as a string and comparing case-folded.
    #[serde(default)]
    pub auth: JsonValue,
    #[serde(default)]
    pub status: Option<String>,
}

impl CatalogAuthResponse {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        let auth_truthy = match &self.user_info.auth {
            JsonValue::Bool(b) => *b,
            JsonValue::Number(n) => n.as_i64().is_some_and(|v| v != 0),
            JsonValue::String(s) => matches!(s.as_str(), "1" | "true" | "Active"),
            _ => false,
        };
        let status_ok = self
            .user_info
            .status
            .as_deref()
            .map_or(true, |s| s.eq_ignore_ascii_case("active"));
        auth_truthy && status_ok
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogCategory {
    pub category_id: String,
    pub category_name: String,
}

/// One `get_live_streams` record. `extra` preserves every upstream field
/// this struct doesn't name, the same "preserve unknown attributes
/// verbatim" rule the playlist dialect follows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogStream {
    pub stream_id: i64,
    pub name: String,
    pub category_id: Option<String>,
    #[serde(default)]
    pub stream_icon: Option<String>,
    #[serde(default)]
    pub epg_channel_id: Option<String>,
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, JsonValue>,
}

/// Playback URL template: `<base>/live/<username>/<password>/<stream_id>.ts`.
#[must_use]
pub fn build_stream_url(base_url: &str, username: &str, password: &str, stream_id: i64) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{base}/live/{username}/{password}/{stream_id}.ts")
}

/// An ordered URL-rewrite rule for per-profile session credential variants
/// (§9 "Runtime duck-typed stream URL rewriting" — expressed here as data,
/// not code).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRewriteRule {
    #[serde(with = "serde_regex")]
    pub search: regex::Regex,
    pub replace: String,
}

mod serde_regex {
    use regex::Regex;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(re: &Regex, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(re.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Regex, D::Error> {
        let raw = String::deserialize(d)?;
        Regex::new(&raw).map_err(D::Error::custom)
    }
}

/// Apply an ordered list of rewrite rules to a URL, first match wins. Pure
/// and independent of any live profile store so it can be unit tested in
/// isolation from HTTP and database concerns.
#[must_use]
pub fn rewrite_url(url: &str, rules: &[UrlRewriteRule]) -> String {
    for rule in rules {
        if rule.search.is_match(url) {
            return rule.search.replace(url, rule.replace.as_str()).into_owned();
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_follows_template() {
        assert_eq!(
            build_stream_url("http://host:8080", "u", "p", 42),
            "http://host:8080/live/u/p/42.ts"
        );
    }

    #[test]
    fn stream_url_trims_trailing_slash_in_base() {
        assert_eq!(
            build_stream_url("http://host:8080/", "u", "p", 1),
            "http://host:8080/live/u/p/1.ts"
        );
    }

    #[test]
    fn auth_response_numeric_truthy() {
        let resp: CatalogAuthResponse = serde_json::from_str(
            r#"{"user_info": {"auth": 1, "status": "Active"}}"#,
        )
        .unwrap();
        assert!(resp.is_authenticated());
    }

    #[test]
    fn auth_response_rejects_disabled_status() {
        let resp: CatalogAuthResponse = serde_json::from_str(
            r#"{"user_info": {"auth": 1, "status": "Disabled"}}"#,
        )
        .unwrap();
        assert!(!resp.is_authenticated());
    }

    #[test]
    fn rewrite_url_first_match_wins() {
        let rules = vec![
            UrlRewriteRule {
                search: Regex::new(r"^http://old-host/(.*)$").unwrap(),
                replace: "http://new-host/$1".to_string(),
            },
        ];
        assert_eq!(
            rewrite_url("http://old-host/u/p/1.ts", &rules),
            "http://new-host/u/p/1.ts"
        );
    }

    #[test]
    fn rewrite_url_passes_through_when_no_rule_matches() {
        assert_eq!(rewrite_url("http://x/y", &[]), "http://x/y");
    }
}
