//! Backend capability seam.
//!
//! The coordinator touches the blob backend through exactly four
//! capabilities; backend quirks (endpoints, regions, header policies) stay
//! behind this trait so the lifecycle logic can be tested against a fake
//! store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{0}` not found in backing store")]
    ObjectNotFound(String),
    #[error("signed url rejected for `{key}`: {reason}")]
    SignatureRejected { key: String, reason: String },
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("backend {op} failed for `{key}`: {message}")]
    Backend {
        op: &'static str,
        key: String,
        message: String,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Metadata returned by a head call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub size: i64,
    pub content_type: String,
}

/// Options for a server-side copy.
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    /// Content type carried over to the destination object.
    pub content_type: Option<String>,
    /// Filename used for the destination's content-disposition.
    pub disposition_name: Option<String>,
    /// Backend metadata tags (actor and item identifiers, for audit).
    pub tags: HashMap<String, String>,
}

/// Options for minting a signed upload URL.
#[derive(Debug, Clone)]
pub struct SignPutOptions {
    /// How long the minted URL stays usable, in seconds.
    pub expiry_secs: u64,
    /// Backend metadata tags recorded with the uploaded object.
    pub tags: HashMap<String, String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch size and content type of an existing object.
    async fn head_object(&self, key: &str) -> StoreResult<ObjectHead>;

    /// Remove an object.
    async fn delete_object(&self, key: &str) -> StoreResult<()>;

    /// Server-side duplicate of `source_key` at `dest_key`.
    async fn copy_object(
        &self,
        source_key: &str,
        dest_key: &str,
        opts: CopyOptions,
    ) -> StoreResult<()>;

    /// Mint a time-limited URL granting one PUT against `key`.
    async fn sign_put_url(&self, key: &str, opts: SignPutOptions) -> StoreResult<String>;
}

#[cfg(test)]
pub mod testing {
    //! Recording in-memory store used by the coordinator tests.

    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    pub struct MemoryStore {
        objects: Mutex<HashMap<String, ObjectHead>>,
        pub head_calls: AtomicUsize,
        pub delete_calls: AtomicUsize,
        pub copy_calls: AtomicUsize,
        pub sign_calls: AtomicUsize,
        pub fail_head: bool,
        pub fail_delete: bool,
        pub fail_copy: bool,
        pub fail_sign: bool,
        pub deleted_keys: Mutex<Vec<String>>,
        pub copies: Mutex<Vec<(String, String)>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(head: bool, delete: bool, copy: bool, sign: bool) -> Self {
            Self {
                fail_head: head,
                fail_delete: delete,
                fail_copy: copy,
                fail_sign: sign,
                ..Self::default()
            }
        }

        pub fn insert_object(&self, key: &str, size: i64, content_type: &str) {
            self.objects.lock().unwrap().insert(
                key.to_string(),
                ObjectHead {
                    size,
                    content_type: content_type.to_string(),
                },
            );
        }

        pub fn contains(&self, key: &str) -> bool {
            self.objects.lock().unwrap().contains_key(key)
        }

        fn backend_error(op: &'static str, key: &str) -> StoreError {
            StoreError::Backend {
                op,
                key: key.to_string(),
                message: "injected failure".into(),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn head_object(&self, key: &str) -> StoreResult<ObjectHead> {
            self.head_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_head {
                return Err(Self::backend_error("head", key));
            }
            self.objects
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| StoreError::ObjectNotFound(key.to_string()))
        }

        async fn delete_object(&self, key: &str) -> StoreResult<()> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete {
                return Err(Self::backend_error("delete", key));
            }
            self.objects.lock().unwrap().remove(key);
            self.deleted_keys.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn copy_object(
            &self,
            source_key: &str,
            dest_key: &str,
            opts: CopyOptions,
        ) -> StoreResult<()> {
            self.copy_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_copy {
                return Err(Self::backend_error("copy", source_key));
            }
            let mut objects = self.objects.lock().unwrap();
            let mut head = objects
                .get(source_key)
                .cloned()
                .ok_or_else(|| StoreError::ObjectNotFound(source_key.to_string()))?;
            if let Some(content_type) = opts.content_type {
                head.content_type = content_type;
            }
            objects.insert(dest_key.to_string(), head);
            self.copies
                .lock()
                .unwrap()
                .push((source_key.to_string(), dest_key.to_string()));
            Ok(())
        }

        async fn sign_put_url(&self, key: &str, opts: SignPutOptions) -> StoreResult<String> {
            self.sign_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_sign {
                return Err(Self::backend_error("sign", key));
            }
            Ok(format!("memory://{key}?expires={}", opts.expiry_secs))
        }
    }
}
