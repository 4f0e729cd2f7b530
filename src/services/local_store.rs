//! Disk-backed object store.
//!
//! Object payloads live beneath `base_path/{key}`; the allocated keys
//! already carry their own shard prefix, so no extra fan-out directories
//! are added. A small JSON sidecar next to each payload holds the content
//! type, disposition name, etag and audit tags the backend would otherwise
//! keep as object metadata.
//!
//! Signed PUT URLs are minted against the service's own `/storage` route:
//! the signature covers key, expiry and audit tags, keyed by the configured
//! secret access key.

use crate::services::object_store::{
    CopyOptions, ObjectHead, ObjectStore, SignPutOptions, StoreError, StoreResult,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// RFC 2104 HMAC over md5. Keyed on both sides of the digest, so the token
/// is not length-extendable the way a bare secret-prefix hash would be.
fn hmac_md5(key: &[u8], message: &[u8]) -> md5::Digest {
    const BLOCK: usize = 64;
    let mut padded = [0u8; BLOCK];
    if key.len() > BLOCK {
        padded[..16].copy_from_slice(&md5::compute(key).0);
    } else {
        padded[..key.len()].copy_from_slice(key);
    }

    let mut inner = Vec::with_capacity(BLOCK + message.len());
    inner.extend(padded.iter().map(|b| b ^ 0x36));
    inner.extend_from_slice(message);
    let inner_digest = md5::compute(&inner);

    let mut outer = Vec::with_capacity(BLOCK + 16);
    outer.extend(padded.iter().map(|b| b ^ 0x5c));
    outer.extend_from_slice(&inner_digest.0);
    md5::compute(&outer)
}

/// Per-object metadata stored next to the payload as `{key}.meta`.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
struct Sidecar {
    content_type: Option<String>,
    disposition_name: Option<String>,
    etag: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

pub struct LocalStore {
    base_path: PathBuf,
    public_url: String,
    access_key_id: String,
    signing_secret: String,
}

impl LocalStore {
    /// `base_path` is the bucket directory, e.g. `{storage_dir}/{bucket}`.
    pub fn new(
        base_path: impl Into<PathBuf>,
        public_url: impl Into<String>,
        access_key_id: impl Into<String>,
        signing_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            public_url: public_url.into(),
            access_key_id: access_key_id.into(),
            signing_secret: signing_secret.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Reject keys that could escape the bucket directory.
    fn ensure_key_safe(key: &str) -> StoreResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        for segment in key.split('/') {
            path.push(segment);
        }
        path
    }

    fn sidecar_path(object_path: &Path) -> PathBuf {
        let mut name = object_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(".meta");
        object_path.with_file_name(name)
    }

    async fn read_sidecar(&self, object_path: &Path) -> Sidecar {
        match fs::read(Self::sidecar_path(object_path)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Sidecar::default(),
        }
    }

    async fn write_sidecar(&self, object_path: &Path, sidecar: &Sidecar) -> StoreResult<()> {
        let bytes = serde_json::to_vec(sidecar).map_err(|err| StoreError::Backend {
            op: "sidecar",
            key: object_path.display().to_string(),
            message: err.to_string(),
        })?;
        fs::write(Self::sidecar_path(object_path), bytes).await?;
        Ok(())
    }

    /// Stream an uploaded body to disk: temp file first, md5 and size
    /// computed while streaming, fsync, then an atomic rename into place.
    pub async fn put_object_stream<S>(
        &self,
        key: &str,
        content_type: Option<String>,
        tags: HashMap<String, String>,
        stream: S,
    ) -> StoreResult<ObjectHead>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StoreError::Io(err));
                }
            };
            size += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }

        let content_type = content_type.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        self.write_sidecar(
            &file_path,
            &Sidecar {
                content_type: Some(content_type.clone()),
                disposition_name: None,
                etag: Some(format!("{:x}", digest.compute())),
                tags,
            },
        )
        .await?;

        Ok(ObjectHead { size, content_type })
    }

    /// Open an object for streaming out, together with its head metadata.
    pub async fn get_object_reader(&self, key: &str) -> StoreResult<(ObjectHead, File)> {
        Self::ensure_key_safe(key)?;
        let head = self.head_object(key).await?;
        let file = File::open(self.object_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::ObjectNotFound(key.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        Ok((head, file))
    }

    fn signature_for(&self, key: &str, expires: i64, member: &str, item: &str) -> String {
        let canonical = format!(
            "{}\n{}\n{}\n{}\n{}",
            self.access_key_id, key, expires, member, item
        );
        format!(
            "{:x}",
            hmac_md5(self.signing_secret.as_bytes(), canonical.as_bytes())
        )
    }

    /// Validate a signed PUT before accepting an upload on the storage
    /// route. Expiry bounds how long the link is usable, not the upload
    /// itself.
    pub fn verify_put_signature(
        &self,
        key: &str,
        expires: i64,
        member: &str,
        item: &str,
        signature: &str,
    ) -> StoreResult<()> {
        Self::ensure_key_safe(key)?;
        if expires < Utc::now().timestamp() {
            return Err(StoreError::SignatureRejected {
                key: key.to_string(),
                reason: "upload link expired".into(),
            });
        }
        if self.signature_for(key, expires, member, item) != signature {
            return Err(StoreError::SignatureRejected {
                key: key.to_string(),
                reason: "signature mismatch".into(),
            });
        }
        Ok(())
    }

    /// Remove now-empty shard directories up to the bucket root.
    async fn prune_empty_dirs(&self, start: &Path) {
        let stop = self.base_path.as_path();
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn head_object(&self, key: &str) -> StoreResult<ObjectHead> {
        Self::ensure_key_safe(key)?;
        let path = self.object_path(key);
        let meta = fs::metadata(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::ObjectNotFound(key.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        let sidecar = self.read_sidecar(&path).await;
        Ok(ObjectHead {
            size: meta.len() as i64,
            content_type: sidecar
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        })
    }

    async fn delete_object(&self, key: &str) -> StoreResult<()> {
        Self::ensure_key_safe(key)?;
        let path = self.object_path(key);
        match fs::remove_file(&path).await {
            Ok(_) => debug!("removed object payload {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::ObjectNotFound(key.to_string()));
            }
            Err(err) => return Err(StoreError::Io(err)),
        }
        let _ = fs::remove_file(Self::sidecar_path(&path)).await;
        if let Some(parent) = path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    async fn copy_object(
        &self,
        source_key: &str,
        dest_key: &str,
        opts: CopyOptions,
    ) -> StoreResult<()> {
        Self::ensure_key_safe(source_key)?;
        Self::ensure_key_safe(dest_key)?;

        let source_path = self.object_path(source_key);
        let dest_path = self.object_path(dest_key);
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(&source_path, &dest_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::ObjectNotFound(source_key.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;

        let source_sidecar = self.read_sidecar(&source_path).await;
        self.write_sidecar(
            &dest_path,
            &Sidecar {
                content_type: opts.content_type.or(source_sidecar.content_type),
                disposition_name: opts.disposition_name,
                etag: source_sidecar.etag,
                tags: opts.tags,
            },
        )
        .await?;
        Ok(())
    }

    async fn sign_put_url(&self, key: &str, opts: SignPutOptions) -> StoreResult<String> {
        Self::ensure_key_safe(key)?;
        let expires = Utc::now().timestamp() + opts.expiry_secs as i64;
        let member = opts.tags.get("member").cloned().unwrap_or_default();
        let item = opts.tags.get("item").cloned().unwrap_or_default();
        let signature = self.signature_for(key, expires, &member, &item);
        Ok(format!(
            "{}/storage/{}?expires={}&member={}&item={}&key-id={}&signature={}",
            self.public_url, key, expires, member, item, self.access_key_id, signature
        ))
    }
}
