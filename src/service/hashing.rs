//! Content-addressed stream hashing (§3 Stream, §4.4).

use sha2::{Digest, Sha256};

use crate::models::{HashKeyField, HashKeyList, ParsedStream, SourceId};

/// `stream_hash := sha256_over(concat(fields_selected_by_key_list))`.
///
/// The key list is an ordered subset of `{name, url, tvg_id, source_id}`;
/// fields are concatenated in key-list order, separated by a byte that
/// cannot appear in any field (`\x1f`, ASCII unit separator) so that e.g.
/// `name="a", url="b"` never collides with `name="ab", url=""`.
#[must_use]
pub fn stream_hash(stream: &ParsedStream, source_id: &SourceId, key_list: &HashKeyList) -> String {
    let mut hasher = Sha256::new();
    for (i, field) in key_list.0.iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f]);
        }
        let value: &str = match field {
            HashKeyField::Name => &stream.name,
            HashKeyField::Url => &stream.url,
            HashKeyField::TvgId => stream.tvg_id().unwrap_or(""),
            HashKeyField::SourceId => source_id.as_str(),
        };
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn stream(name: &str, url: &str) -> ParsedStream {
        ParsedStream {
            name: name.to_string(),
            url: url.to_string(),
            attrs: HashMap::new(),
        }
    }

    #[test]
    fn same_inputs_produce_same_hash() {
        let key_list = HashKeyList(vec![HashKeyField::Url]);
        let source = SourceId::from("src1");
        let a = stream_hash(&stream("A", "http://x/1.ts"), &source, &key_list);
        let b = stream_hash(&stream("B", "http://x/1.ts"), &source, &key_list);
        assert_eq!(a, b, "name excluded from key list must not affect hash");
    }

    #[test]
    fn excluding_source_id_merges_across_sources() {
        let key_list = HashKeyList(vec![HashKeyField::Url]);
        let s = stream("A", "http://x/1.ts");
        let a = stream_hash(&s, &SourceId::from("src1"), &key_list);
        let b = stream_hash(&s, &SourceId::from("src2"), &key_list);
        assert_eq!(a, b);
    }

    #[test]
    fn including_source_id_separates_sources() {
        let key_list = HashKeyList(vec![HashKeyField::Url, HashKeyField::SourceId]);
        let s = stream("A", "http://x/1.ts");
        let a = stream_hash(&s, &SourceId::from("src1"), &key_list);
        let b = stream_hash(&s, &SourceId::from("src2"), &key_list);
        assert_ne!(a, b);
    }

    #[test]
    fn field_boundary_does_not_collide() {
        let key_list = HashKeyList(vec![HashKeyField::Name, HashKeyField::Url]);
        let source = SourceId::from("src1");
        let a = stream_hash(&stream("a", "b"), &source, &key_list);
        let b = stream_hash(&stream("ab", ""), &source, &key_list);
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_deterministic_hex_sha256_length() {
        let key_list = HashKeyList::default();
        let h = stream_hash(&stream("A", "http://x/1.ts"), &SourceId::from("src1"), &key_list);
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
