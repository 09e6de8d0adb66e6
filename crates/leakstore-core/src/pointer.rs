//! Pointer and Search Hit Types
//!
//! A [`Pointer`] is a weak reference into the part store: (bucket, part,
//! byte offset). It is a relation, never an ownership edge - it stays valid
//! only as long as the referenced part file is never rewritten or truncated,
//! which the write-once layout guarantees.
//!
//! A [`SearchHit`] is what the search backend returns for a query: the index
//! the document lives in plus the stored location fields. The hit carries a
//! pointer in disguise; [`SearchHit::pointer`] makes it explicit.

use serde::{Deserialize, Serialize};

use crate::layout;

/// Location of a single line of text inside a part file.
///
/// The offset MUST be the first byte of the line; resolution is always
/// seek-to-offset followed by read-one-line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pointer {
    /// Bucket the part file belongs to.
    pub bucket: String,

    /// Part number within the bucket.
    pub part: u32,

    /// Byte offset of the line start inside the part file.
    pub offset: u64,
}

impl Pointer {
    pub fn new(bucket: impl Into<String>, part: u32, offset: u64) -> Self {
        Self {
            bucket: bucket.into(),
            part,
            offset,
        }
    }
}

impl std::fmt::Display for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/part{}@{}", self.bucket, self.part, self.offset)
    }
}

/// One raw hit from the search backend.
///
/// `index` is the backend index identifier (e.g. `bucket-acme-2019`); the
/// remaining fields are the stored source payload. The full record text is
/// never stored in the index - only `fragment` (the searchable key) and
/// `tld` (its derived key) plus the location fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Index identifier the hit came from.
    pub index: String,

    /// Part number within the bucket.
    pub part: u32,

    /// Byte offset of the line start inside the part file.
    pub offset: u64,

    /// Searchable key stored in the index.
    #[serde(default)]
    pub fragment: String,

    /// Derived key (top-level domain) stored in the index.
    #[serde(default)]
    pub tld: String,
}

impl SearchHit {
    /// Bucket name derived from the index identifier, if the identifier
    /// carries the expected prefix.
    pub fn bucket(&self) -> Option<&str> {
        layout::bucket_from_index(&self.index)
    }

    /// The location this hit points at, if the bucket can be derived.
    pub fn pointer(&self) -> Option<Pointer> {
        self.bucket()
            .map(|b| Pointer::new(b, self.part, self.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_display() {
        let p = Pointer::new("acme", 2, 1024);
        assert_eq!(p.to_string(), "acme/part2@1024");
    }

    #[test]
    fn test_hit_bucket_derivation() {
        let hit = SearchHit {
            index: "bucket-acme-2019".to_string(),
            part: 0,
            offset: 10,
            fragment: "a.com".to_string(),
            tld: "com".to_string(),
        };
        assert_eq!(hit.bucket(), Some("acme-2019"));
        assert_eq!(hit.pointer(), Some(Pointer::new("acme-2019", 0, 10)));
    }

    #[test]
    fn test_hit_foreign_index_has_no_bucket() {
        let hit = SearchHit {
            index: "kibana-internal".to_string(),
            part: 0,
            offset: 0,
            fragment: String::new(),
            tld: String::new(),
        };
        assert_eq!(hit.bucket(), None);
        assert_eq!(hit.pointer(), None);
    }

    #[test]
    fn test_hit_deserializes_without_optional_fields() {
        let hit: SearchHit =
            serde_json::from_str(r#"{"index":"bucket-x","part":1,"offset":5}"#).unwrap();
        assert_eq!(hit.part, 1);
        assert_eq!(hit.fragment, "");
        assert_eq!(hit.tld, "");
    }
}
