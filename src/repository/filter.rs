//! Per-source regex stream filters. Stored denormalized on `sources.filters`
//! (see `repository::source`); this module owns validating and compiling
//! them, since every filter the upserter applies must be parsed once and
//! reused across the whole batch rather than recompiled per stream.

use regex::{Regex, RegexBuilder};

use crate::error::Error;
use crate::models::{FilterField, StreamFilter};
use crate::Result;

/// A `StreamFilter` with its pattern compiled, ready to test against a
/// candidate field value.
pub struct CompiledFilter {
    pub field: FilterField,
    pub exclude: bool,
    regex: Regex,
}

impl CompiledFilter {
    pub fn compile(filter: &StreamFilter) -> Result<Self> {
        let regex = RegexBuilder::new(&filter.pattern)
            .case_insensitive(!filter.case_sensitive)
            .build()
            .map_err(|e| Error::InvalidInput(format!("invalid filter pattern: {e}")))?;
        Ok(Self {
            field: filter.field.clone(),
            exclude: filter.exclude,
            regex,
        })
    }

    #[must_use]
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// Compile a source's whole filter list, short-circuiting on the first
/// invalid pattern so a bad filter never silently admits everything.
pub fn compile_filters(filters: &[StreamFilter]) -> Result<Vec<CompiledFilter>> {
    filters.iter().map(CompiledFilter::compile).collect()
}

/// Apply the compiled filter chain to one candidate field set, walking
/// filters in order: on the first pattern that matches its field's value,
/// the stream is included iff that filter is not an exclude filter, and
/// every later filter is ignored. A stream that matches no filter at all is
/// included by default.
#[must_use]
pub fn passes_filters(filters: &[CompiledFilter], name: &str, url: &str, group: &str) -> bool {
    let field_value = |field: &FilterField| -> &str {
        match field {
            FilterField::Name => name,
            FilterField::Url => url,
            FilterField::Group => group,
        }
    };

    for filter in filters {
        let value = field_value(&filter.field);
        if filter.is_match(value) {
            return !filter.exclude;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(field: FilterField, pattern: &str, exclude: bool) -> StreamFilter {
        StreamFilter {
            field,
            pattern: pattern.to_string(),
            exclude,
            case_sensitive: false,
        }
    }

    #[test]
    fn exclude_filter_rejects_matching_name() {
        let compiled = compile_filters(&[filter(FilterField::Name, "adult", true)]).unwrap();
        assert!(!passes_filters(&compiled, "Adult Channel", "u", "g"));
        assert!(passes_filters(&compiled, "News Channel", "u", "g"));
    }

    #[test]
    fn include_filter_matches_pass_and_unmatched_streams_pass_by_default() {
        let compiled = compile_filters(&[filter(FilterField::Group, "^Sports", false)]).unwrap();
        assert!(passes_filters(&compiled, "n", "u", "Sports HD"));
        // No filter matches "News", so it is included by default.
        assert!(passes_filters(&compiled, "n", "u", "News"));
    }

    #[test]
    fn no_filters_passes_everything() {
        assert!(passes_filters(&[], "n", "u", "g"));
    }

    #[test]
    fn invalid_pattern_is_rejected_at_compile_time() {
        let result = compile_filters(&[filter(FilterField::Name, "(unclosed", false)]);
        assert!(result.is_err());
    }

    #[test]
    fn first_matching_filter_wins_regardless_of_later_filters() {
        let compiled = compile_filters(&[
            filter(FilterField::Group, "Sports", false),
            filter(FilterField::Group, ".*", true),
        ])
        .unwrap();
        assert!(passes_filters(&compiled, "n", "u", "Sports"));
    }

    #[test]
    fn exclude_filter_before_a_later_include_still_wins_first() {
        let compiled = compile_filters(&[
            filter(FilterField::Group, ".*", true),
            filter(FilterField::Group, "Sports", false),
        ])
        .unwrap();
        assert!(!passes_filters(&compiled, "n", "u", "Sports"));
    }
}
