//! Data model shared between the item pipeline and the object-lifecycle
//! coordinator.
//!
//! These entities map cleanly to database rows via `sqlx::FromRow` and
//! serialize naturally as JSON via `serde`.

pub mod item;
pub mod object_ref;
