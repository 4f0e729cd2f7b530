//! Service layer: the object-lifecycle coordinator and its collaborators.
//!
//! `items` supplies the generic CRUD pipeline and hook registry; `keys`,
//! `backfill`, `lifecycle` and `upload_intent` form the coordinator core;
//! `object_store` is the backend capability seam and `local_store` the
//! disk-backed implementation of it.

pub mod backfill;
pub mod items;
pub mod keys;
pub mod lifecycle;
pub mod local_store;
pub mod object_store;
pub mod upload_intent;
