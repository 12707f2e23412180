//! §4.2 Parser — two dialect decoders producing one internal stream record.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{
    build_stream_url, CatalogCategory, CatalogStream, ParseOutput, ParsedGroupInfo, ParsedStream,
};

/// Matches `key="value"`, `key='value'`, or a bare `key=value` run up to
/// the next whitespace — upstream playlists are inconsistent about quoting
/// attribute values, and all three forms are accepted.
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=]+)=(?:"([^"]*)"|'([^']*)'|(\S+))"#).expect("static regex")
});

/// Known playlist attribute keys, matched case-insensitively.
const KNOWN_KEYS: &[&str] = &["tvg-name", "tvg-id", "tvg-logo", "group-title"];

/// Parse a complete playlist document (`#EXTM3U` header optional, a
/// sequence of `#EXTINF:` / url line pairs).
///
/// The header sentinel is not required to be present or first; callers that
/// need content-validation before parsing should run
/// [`crate::service::fetcher::looks_like_playlist`] first.
#[must_use]
pub fn parse_playlist(text: &str) -> ParseOutput {
    let mut out = ParseOutput::new();
    let mut pending: Option<ParsedStream> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim_end_matches('\r');
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("#EXTINF:") {
            // A new header discards any header parsed but never bound to a
            // URL line before the next header — unbound headers are dropped.
            pending = Some(parse_extinf(rest));
        } else if trimmed.starts_with("http") {
            if let Some(mut stream) = pending.take() {
                stream.url = trimmed.to_string();
                out.observe_group(stream.group_title());
                out.streams.push(stream);
            }
        }
        // Any other line (comments, #EXTM3U, #EXTGRP, ...) is ignored.
    }

    out
}

/// Parse one `#EXTINF:` header's content (everything after the colon).
///
/// Splits on the first comma that is not inside a quoted attribute value;
/// the left side is the attribute list, the right side the fallback
/// display name. `$1`/backreference syntax is not involved here — that
/// canonicalization belongs to the auto-channel projector's rename step.
fn parse_extinf(rest: &str) -> ParsedStream {
    let (attr_part, display_name) = split_header_on_unquoted_comma(rest);

    let mut attrs: HashMap<String, String> = HashMap::new();
    for caps in ATTR_RE.captures_iter(attr_part) {
        let key = caps[1].to_lowercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map_or("", |m| m.as_str())
            .to_string();
        attrs.insert(key, value);
    }

    let name = attrs
        .get("tvg-name")
        .cloned()
        .unwrap_or_else(|| display_name.trim().to_string());

    ParsedStream {
        name,
        url: String::new(),
        attrs,
    }
}

/// Manual quote-tracking scan for "split on the first comma outside a
/// quoted value". The Python original expresses this with a lookahead
/// regex; the `regex` crate has no lookahead support, so this walks the
/// string tracking open-quote state instead. Tolerates both `"` and `'`.
fn split_header_on_unquoted_comma(s: &str) -> (&str, &str) {
    let mut in_quote: Option<char> = None;
    for (idx, ch) in s.char_indices() {
        match in_quote {
            Some(q) if ch == q => in_quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => in_quote = Some(ch),
            None if ch == ',' => return (&s[..idx], &s[idx + 1..]),
            None => {}
        }
    }
    (s, "")
}

/// Normalize a catalog fetch into the same `ParseOutput` shape the playlist
/// decoder produces (§4.2 "Catalog dialect"). `categories` seeds `Groups`
/// with each upstream category's `xc_id`; `streams` are converted one by one
/// with the playback URL built from the template and every upstream field
/// preserved in `attrs` as a string, `tvg-id`/`tvg-logo`/`group-title`
/// renamed onto the playlist dialect's attribute names.
#[must_use]
pub fn parse_catalog(
    base_url: &str,
    username: &str,
    password: &str,
    categories: &[CatalogCategory],
    streams: &[CatalogStream],
) -> ParseOutput {
    let mut out = ParseOutput::new();

    let mut category_names: HashMap<&str, &str> = HashMap::new();
    for category in categories {
        category_names.insert(category.category_id.as_str(), category.category_name.as_str());
        out.groups.insert(
            category.category_name.clone(),
            ParsedGroupInfo { xc_id: Some(category.category_id.clone()) },
        );
    }

    for stream in streams {
        let group_title = stream
            .category_id
            .as_deref()
            .and_then(|id| category_names.get(id).copied())
            .unwrap_or(crate::models::DEFAULT_GROUP)
            .to_string();

        let mut attrs: HashMap<String, String> = HashMap::new();
        if let Some(epg_channel_id) = &stream.epg_channel_id {
            attrs.insert("tvg-id".to_string(), epg_channel_id.clone());
        }
        if let Some(stream_icon) = &stream.stream_icon {
            attrs.insert("tvg-logo".to_string(), stream_icon.clone());
        }
        attrs.insert("group-title".to_string(), group_title.clone());
        for (key, value) in &stream.extra {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => continue,
                other => other.to_string(),
            };
            attrs.entry(key.clone()).or_insert(rendered);
        }

        out.observe_group(&group_title);
        out.streams.push(ParsedStream {
            name: stream.name.clone(),
            url: build_stream_url(base_url, username, password, stream.stream_id),
            attrs,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_two_entry_playlist() {
        let input = "#EXTM3U\n\
             #EXTINF:-1 tvg-id=\"sport1\" tvg-logo=\"L1\" group-title=\"Sports\",Sport HD\n\
             http://a.example/s1.ts\n\
             #EXTINF:-1 tvg-id=\"news1\" group-title=\"News\",News 24\n\
             http://a.example/s2.ts\n";

        let out = parse_playlist(input);
        assert_eq!(out.streams.len(), 2);
        assert_eq!(out.streams[0].name, "Sport HD");
        assert_eq!(out.streams[0].url, "http://a.example/s1.ts");
        assert_eq!(out.streams[0].tvg_id(), Some("sport1"));
        assert_eq!(out.streams[0].group_title(), "Sports");
        assert!(out.groups.contains_key("Sports"));
        assert!(out.groups.contains_key("News"));
        assert!(out.groups.contains_key(crate::models::DEFAULT_GROUP));
    }

    #[test]
    fn quoted_comma_in_display_name_does_not_split_header() {
        let input = "#EXTINF:-1 tvg-id=\"x\" group-title=\"Intl, Movies\",Show Name\nhttp://a/b.ts\n";
        let out = parse_playlist(input);
        assert_eq!(out.streams.len(), 1);
        assert_eq!(out.streams[0].group_title(), "Intl, Movies");
        assert_eq!(out.streams[0].name, "Show Name");
    }

    #[test]
    fn attribute_key_case_is_resolved_case_insensitively() {
        let input = "#EXTINF:-1 TVG-ID=\"x\" Group-Title=\"Sports\",Name\nhttp://a/b.ts\n";
        let out = parse_playlist(input);
        assert_eq!(out.streams[0].tvg_id(), Some("x"));
        assert_eq!(out.streams[0].group_title(), "Sports");
    }

    #[test]
    fn tvg_name_overrides_display_name() {
        let input = "#EXTINF:-1 tvg-name=\"Canonical\",Fallback\nhttp://a/b.ts\n";
        let out = parse_playlist(input);
        assert_eq!(out.streams[0].name, "Canonical");
    }

    #[test]
    fn unbound_header_is_discarded() {
        let input = "#EXTINF:-1,Orphan\n#EXTINF:-1,Bound\nhttp://a/b.ts\n";
        let out = parse_playlist(input);
        assert_eq!(out.streams.len(), 1);
        assert_eq!(out.streams[0].name, "Bound");
    }

    #[test]
    fn unknown_attributes_are_preserved() {
        let input = "#EXTINF:-1 custom-flag=\"yes\",Name\nhttp://a/b.ts\n";
        let out = parse_playlist(input);
        assert_eq!(out.streams[0].attr("custom-flag"), Some("yes"));
    }

    #[test]
    fn single_quoted_attribute_values_are_tolerated() {
        let input = "#EXTINF:-1 tvg-id='sport1' group-title='Sports',Name\nhttp://a/b.ts\n";
        let out = parse_playlist(input);
        assert_eq!(out.streams[0].tvg_id(), Some("sport1"));
    }

    #[test]
    fn unquoted_attribute_values_are_accepted() {
        let input = "#EXTINF:-1 tvg-id=sport1 group-title=Sports,Name\nhttp://a/b.ts\n";
        let out = parse_playlist(input);
        assert_eq!(out.streams[0].tvg_id(), Some("sport1"));
        assert_eq!(out.streams[0].group_title(), "Sports");
    }

    #[test]
    fn mixed_quoted_and_unquoted_attributes_in_one_header() {
        let input = "#EXTINF:-1 tvg-id=\"sport1\" tvg-logo=http://logo/1.png,Name\nhttp://a/b.ts\n";
        let out = parse_playlist(input);
        assert_eq!(out.streams[0].tvg_id(), Some("sport1"));
        assert_eq!(out.streams[0].attr("tvg-logo"), Some("http://logo/1.png"));
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let input = "#EXTINF:-1,Name\r\nhttp://a/b.ts\r\n";
        let out = parse_playlist(input);
        assert_eq!(out.streams.len(), 1);
    }

    #[test]
    fn known_keys_constant_covers_documented_attributes() {
        for k in KNOWN_KEYS {
            assert!(!k.is_empty());
        }
    }

    #[test]
    fn catalog_parse_builds_stream_url_and_group_title() {
        let categories = vec![CatalogCategory {
            category_id: "7".to_string(),
            category_name: "Sports".to_string(),
        }];
        let streams = vec![CatalogStream {
            stream_id: 42,
            name: "Sport HD".to_string(),
            category_id: Some("7".to_string()),
            stream_icon: Some("http://logo/1.png".to_string()),
            epg_channel_id: Some("sport1".to_string()),
            extra: HashMap::new(),
        }];

        let out = parse_catalog("http://host:80", "u", "p", &categories, &streams);
        assert_eq!(out.streams.len(), 1);
        let s = &out.streams[0];
        assert_eq!(s.url, "http://host:80/live/u/p/42.ts");
        assert_eq!(s.group_title(), "Sports");
        assert_eq!(s.tvg_id(), Some("sport1"));
        assert!(out.groups.get("Sports").unwrap().xc_id.as_deref() == Some("7"));
    }

    #[test]
    fn catalog_parse_falls_back_to_default_group_for_unknown_category() {
        let streams = vec![CatalogStream {
            stream_id: 1,
            name: "Orphan".to_string(),
            category_id: Some("missing".to_string()),
            stream_icon: None,
            epg_channel_id: None,
            extra: HashMap::new(),
        }];
        let out = parse_catalog("http://host", "u", "p", &[], &streams);
        assert_eq!(out.streams[0].group_title(), crate::models::DEFAULT_GROUP);
    }
}
