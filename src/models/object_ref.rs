//! Reference to the blob object backing a file item.

use serde::{Deserialize, Serialize};

/// Describes the backend object a file item points at.
///
/// `size` and `contenttype` start out absent and are filled in together by
/// the metadata backfill on first read. A zero-byte object is a valid,
/// fully-fetched state, so presence is tracked with `Option` rather than a
/// sentinel value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectRef {
    /// User-facing original filename, truncated independently of `key`.
    pub name: String,

    /// Backend-unique path, `{hex4}/{hex4}/{hex4}-{unix_millis}`. Immutable
    /// once an object exists at that key; replaced wholesale on copy.
    pub key: String,

    /// Byte length, absent until fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,

    /// MIME type, absent until fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contenttype: Option<String>,
}

impl ObjectRef {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            size: None,
            contenttype: None,
        }
    }

    /// True when both metadata fields were already fetched. Drives the
    /// backfill short-circuit; the fields are only ever written together.
    pub fn has_metadata(&self) -> bool {
        self.size.is_some() && self.contenttype.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_byte_object_counts_as_fetched() {
        let mut object_file = ObjectRef::new("empty.bin", "aa/bb/cc-0");
        assert!(!object_file.has_metadata());

        object_file.size = Some(0);
        object_file.contenttype = Some("application/octet-stream".into());
        assert!(object_file.has_metadata());
    }

    #[test]
    fn partial_metadata_is_not_fetched() {
        let mut object_file = ObjectRef::new("a.txt", "aa/bb/cc-0");
        object_file.size = Some(12);
        assert!(!object_file.has_metadata());
    }

    #[test]
    fn absent_fields_are_omitted_from_json() {
        let object_file = ObjectRef::new("a.txt", "aa/bb/cc-0");
        let json = serde_json::to_string(&object_file).unwrap();
        assert!(!json.contains("size"));
        assert!(!json.contains("contenttype"));
    }
}
