//! Uniform in-memory representation produced by both dialect decoders.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One stream record as produced by either dialect decoder, before any
/// persistence-layer identity has been assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedStream {
    pub name: String,
    pub url: String,
    /// Attribute bag: known keys (`tvg-id`, `tvg-logo`, `group-title`, ...)
    /// plus every unrecognized upstream attribute, preserved verbatim.
    pub attrs: HashMap<String, String>,
}

impl ParsedStream {
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn tvg_id(&self) -> Option<&str> {
        self.attr("tvg-id")
    }

    #[must_use]
    pub fn tvg_logo(&self) -> Option<&str> {
        self.attr("tvg-logo")
    }

    #[must_use]
    pub fn group_title(&self) -> &str {
        self.attr("group-title").unwrap_or("Default Group")
    }
}

/// Per-group metadata discovered during parsing; currently only the
/// catalog dialect's category id, used to resolve which groups the user
/// has enabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedGroupInfo {
    pub xc_id: Option<String>,
}

pub const DEFAULT_GROUP: &str = "Default Group";

/// The parser's full output: the stream sequence plus the `Groups` mapping.
/// `Default Group` is always present, even for catalogs/playlists that
/// never reference it explicitly.
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub streams: Vec<ParsedStream>,
    pub groups: HashMap<String, ParsedGroupInfo>,
}

impl ParseOutput {
    #[must_use]
    pub fn new() -> Self {
        let mut groups = HashMap::new();
        groups.insert(DEFAULT_GROUP.to_string(), ParsedGroupInfo::default());
        Self {
            streams: Vec::new(),
            groups,
        }
    }

    pub fn observe_group(&mut self, name: &str) {
        self.groups.entry(name.to_string()).or_default();
    }
}
