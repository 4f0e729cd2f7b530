//! Generic item record, specialized by a type discriminator.

use crate::models::object_ref::ObjectRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// Type discriminator for items whose payload lives in the object store.
pub const FILE_ITEM_TYPE: &str = "objectFile";

/// Extensible per-item payload stored as a JSON column.
///
/// The coordinator only owns the `objectFile` slot; anything else another
/// item type put in here is carried through untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ItemExtra {
    #[serde(rename = "objectFile", skip_serializing_if = "Option::is_none")]
    pub object_file: Option<ObjectRef>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl ItemExtra {
    pub fn with_object_file(object_file: ObjectRef) -> Self {
        Self {
            object_file: Some(object_file),
            rest: Map::new(),
        }
    }
}

/// A generic item record.
///
/// The database row is the source of truth for identity and metadata; the
/// blob object is owned by whichever row currently references its key.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Item {
    /// Unique identifier, minted on creation and on copy.
    pub id: Uuid,

    /// Display name, independent of any backing object key.
    pub name: String,

    /// Type discriminator, e.g. [`FILE_ITEM_TYPE`].
    pub item_type: String,

    /// Optional parent for tree-shaped item collections.
    pub parent_id: Option<Uuid>,

    /// Identity of the member that created this record.
    pub creator: Uuid,

    /// Type-specific payload (JSON text in the database).
    pub extra: Json<ItemExtra>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// The backing object reference, present only for file items that carry
    /// one. Items of other types (or file items with a missing slot) yield
    /// `None`, which callers treat as a no-op rather than an error.
    pub fn object_ref(&self) -> Option<&ObjectRef> {
        if self.item_type != FILE_ITEM_TYPE {
            return None;
        }
        self.extra.object_file.as_ref()
    }

    pub fn object_ref_mut(&mut self) -> Option<&mut ObjectRef> {
        if self.item_type != FILE_ITEM_TYPE {
            return None;
        }
        self.extra.0.object_file.as_mut()
    }
}
