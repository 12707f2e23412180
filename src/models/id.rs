use nanoid::nanoid;
use serde::{Deserialize, Serialize};

/// Generate a 12-character nanoid for entity IDs
pub fn generate_id() -> String {
    nanoid!(12)
}

/// Declares a newtype wrapper around `String` mapped transparently to a
/// Postgres TEXT column. Every id type below needs the same
/// `new`/`from_string`/`as_str`/`Display`/sqlx impls, so it's generated once.
macro_rules! nanoid_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(generate_id())
            }

            #[must_use]
            pub const fn from_string(id: String) -> Self {
                Self(id)
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
                <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
                let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                Ok(Self(s))
            }
        }
    };
}

nanoid_id!(SourceId, "Source ID type (CHAR(12) nanoid)");
nanoid_id!(GroupId, "Group ID type (CHAR(12) nanoid)");
nanoid_id!(StreamId, "Stream ID type (CHAR(12) nanoid)");
nanoid_id!(ChannelId, "Channel ID type (CHAR(12) nanoid)");
nanoid_id!(FilterId, "Stream filter ID type (CHAR(12) nanoid)");

// External collaborator entities: the core reads and binds these by id but
// does not own their lifecycle (stream profiles, channel profiles, logos,
// EPG data). They get the same wrapper for type-safety at call sites.
nanoid_id!(StreamProfileId, "Stream profile ID (external collaborator)");
nanoid_id!(ChannelProfileId, "Channel profile ID (external collaborator)");
nanoid_id!(LogoId, "Logo ID (external collaborator)");
nanoid_id!(EpgDataId, "EPG data ID (external collaborator)");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id = generate_id();
        assert_eq!(id.len(), 12);
    }

    #[test]
    fn test_source_id_uniqueness() {
        let id1 = SourceId::new();
        let id2 = SourceId::new();
        assert_ne!(id1, id2);
        assert_eq!(id1.as_str().len(), 12);
    }

    #[test]
    fn test_stream_id_roundtrip_string() {
        let id = StreamId::from("abc123xyz987");
        assert_eq!(id.as_str(), "abc123xyz987");
        assert_eq!(id.to_string(), "abc123xyz987");
    }

    #[test]
    fn test_channel_id_ordering_is_string_ordering() {
        let a = ChannelId::from_string("aaaaaaaaaaaa".to_string());
        let b = ChannelId::from_string("bbbbbbbbbbbb".to_string());
        assert!(a < b);
    }
}
