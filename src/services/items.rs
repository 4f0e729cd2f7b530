//! Generic item CRUD pipeline and its interception points.
//!
//! The coordinator treats this as an external collaborator: it only needs
//! "run an operation, get back an item" plus the ability to register pre-
//! and post-hooks against the named copy and delete operations. Hooks live
//! in an explicit registry (operation name to ordered handler list) so
//! registration is statically visible instead of patched in at runtime.

use crate::models::item::{Item, ItemExtra};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Operation names hooks are keyed by.
pub const COPY_ITEM_OP: &str = "copy-item";
pub const DELETE_ITEM_OP: &str = "delete-item";

/// Caller identity, resolved upstream of this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("item `{0}` not found")]
    ItemNotFound(Uuid),
    #[error("pre-hook for `{op}` failed: {source}")]
    Hook {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Runs before the database write of the intercepted operation, on the
/// in-flight record. An error aborts the whole operation.
#[async_trait]
pub trait PreHook: Send + Sync {
    async fn run(&self, item: &mut Item, actor: &Actor) -> anyhow::Result<()>;
}

/// Runs after the database write has committed. Cannot fail the operation;
/// whatever cleanup it performs is best-effort by construction.
#[async_trait]
pub trait PostHook: Send + Sync {
    async fn run(&self, item: &Item, actor: &Actor);
}

/// Interceptor registry: operation name to ordered handler list.
#[derive(Default)]
pub struct HookRegistry {
    pre: HashMap<&'static str, Vec<Arc<dyn PreHook>>>,
    post: HashMap<&'static str, Vec<Arc<dyn PostHook>>>,
}

impl HookRegistry {
    pub fn register_pre(&mut self, op: &'static str, hook: Arc<dyn PreHook>) {
        self.pre.entry(op).or_default().push(hook);
    }

    pub fn register_post(&mut self, op: &'static str, hook: Arc<dyn PostHook>) {
        self.post.entry(op).or_default().push(hook);
    }

    async fn run_pre(&self, op: &'static str, item: &mut Item, actor: &Actor) -> PipelineResult<()> {
        if let Some(hooks) = self.pre.get(op) {
            for hook in hooks {
                hook.run(item, actor)
                    .await
                    .map_err(|source| PipelineError::Hook { op, source })?;
            }
        }
        Ok(())
    }

    async fn run_post(&self, op: &'static str, item: &Item, actor: &Actor) {
        if let Some(hooks) = self.post.get(op) {
            for hook in hooks {
                hook.run(item, actor).await;
            }
        }
    }
}

/// Transactional persistence consumed by the pipeline (and by the metadata
/// backfill, which updates item extras directly).
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn insert(&self, item: &Item) -> PipelineResult<()>;
    async fn fetch(&self, id: Uuid) -> PipelineResult<Item>;
    async fn update_extra(&self, id: Uuid, extra: &ItemExtra) -> PipelineResult<()>;
    async fn delete(&self, id: Uuid) -> PipelineResult<Item>;
}

/// Sqlite-backed item persistence.
#[derive(Clone)]
pub struct SqliteItemStore {
    db: Arc<SqlitePool>,
}

impl SqliteItemStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

const ITEM_COLUMNS: &str =
    "id, name, item_type, parent_id, creator, extra, created_at, updated_at";

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn insert(&self, item: &Item) -> PipelineResult<()> {
        sqlx::query(
            "INSERT INTO items (id, name, item_type, parent_id, creator, extra, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.item_type)
        .bind(item.parent_id)
        .bind(item.creator)
        .bind(&item.extra)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> PipelineResult<Item> {
        sqlx::query_as::<_, Item>(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"))
            .bind(id)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => PipelineError::ItemNotFound(id),
                other => PipelineError::Sqlx(other),
            })
    }

    async fn update_extra(&self, id: Uuid, extra: &ItemExtra) -> PipelineResult<()> {
        let result = sqlx::query("UPDATE items SET extra = ?, updated_at = ? WHERE id = ?")
            .bind(Json(extra))
            .bind(Utc::now())
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PipelineError::ItemNotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> PipelineResult<Item> {
        let item = self.fetch(id).await?;
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PipelineError::ItemNotFound(id));
        }
        Ok(item)
    }
}

/// Sequences item operations and dispatches the hook registry around them.
#[derive(Clone)]
pub struct ItemPipeline {
    store: Arc<dyn ItemStore>,
    hooks: Arc<HookRegistry>,
}

impl ItemPipeline {
    pub fn new(store: Arc<dyn ItemStore>, hooks: Arc<HookRegistry>) -> Self {
        Self { store, hooks }
    }

    pub async fn create_item(
        &self,
        actor: &Actor,
        name: &str,
        item_type: &str,
        parent_id: Option<Uuid>,
        extra: ItemExtra,
    ) -> PipelineResult<Item> {
        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4(),
            name: name.to_string(),
            item_type: item_type.to_string(),
            parent_id,
            creator: actor.id,
            extra: Json(extra),
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&item).await?;
        Ok(item)
    }

    pub async fn get_item(&self, id: Uuid) -> PipelineResult<Item> {
        self.store.fetch(id).await
    }

    /// Full copy with a new id. Pre-hooks run against the in-flight record
    /// before it is persisted, so a hook can rewrite its extra (notably the
    /// backing object key) and a hook failure leaves no row behind.
    pub async fn copy_item(
        &self,
        actor: &Actor,
        id: Uuid,
        parent_id: Option<Uuid>,
    ) -> PipelineResult<Item> {
        let source = self.store.fetch(id).await?;
        let now = Utc::now();
        let mut copy = Item {
            id: Uuid::new_v4(),
            parent_id: parent_id.or(source.parent_id),
            creator: actor.id,
            created_at: now,
            updated_at: now,
            ..source
        };
        self.hooks.run_pre(COPY_ITEM_OP, &mut copy, actor).await?;
        self.store.insert(&copy).await?;
        Ok(copy)
    }

    /// Deletes the row, then runs post-hooks with the already-committed
    /// record. Post-hook outcomes cannot affect the returned result.
    pub async fn delete_item(&self, actor: &Actor, id: Uuid) -> PipelineResult<Item> {
        let item = self.store.delete(id).await?;
        self.hooks.run_post(DELETE_ITEM_OP, &item, actor).await;
        Ok(item)
    }
}

#[cfg(test)]
pub mod testing {
    //! Sqlite helpers shared by the service tests.

    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    pub async fn memory_pool() -> Arc<SqlitePool> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for stmt in include_str!("../../migrations/0001_init.sql")
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        Arc::new(pool)
    }

    pub fn actor() -> Actor {
        Actor { id: Uuid::new_v4() }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{actor, memory_pool};
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RenamingPreHook {
        suffix: &'static str,
    }

    #[async_trait]
    impl PreHook for RenamingPreHook {
        async fn run(&self, item: &mut Item, _actor: &Actor) -> anyhow::Result<()> {
            item.name.push_str(self.suffix);
            Ok(())
        }
    }

    struct FailingPreHook;

    #[async_trait]
    impl PreHook for FailingPreHook {
        async fn run(&self, _item: &mut Item, _actor: &Actor) -> anyhow::Result<()> {
            Err(anyhow!("boom"))
        }
    }

    struct CountingPostHook {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PostHook for CountingPostHook {
        async fn run(&self, _item: &Item, _actor: &Actor) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn pipeline_with(hooks: HookRegistry) -> ItemPipeline {
        let db = memory_pool().await;
        ItemPipeline::new(Arc::new(SqliteItemStore::new(db)), Arc::new(hooks))
    }

    #[tokio::test]
    async fn create_then_fetch_round_trips() {
        let pipeline = pipeline_with(HookRegistry::default()).await;
        let actor = actor();
        let created = pipeline
            .create_item(&actor, "notes", "folder", None, ItemExtra::default())
            .await
            .unwrap();

        let fetched = pipeline.get_item(created.id).await.unwrap();
        assert_eq!(fetched.name, "notes");
        assert_eq!(fetched.creator, actor.id);
    }

    #[tokio::test]
    async fn pre_hooks_run_in_registration_order() {
        let mut hooks = HookRegistry::default();
        hooks.register_pre(COPY_ITEM_OP, Arc::new(RenamingPreHook { suffix: "-a" }));
        hooks.register_pre(COPY_ITEM_OP, Arc::new(RenamingPreHook { suffix: "-b" }));
        let pipeline = pipeline_with(hooks).await;
        let actor = actor();

        let source = pipeline
            .create_item(&actor, "doc", "folder", None, ItemExtra::default())
            .await
            .unwrap();
        let copy = pipeline.copy_item(&actor, source.id, None).await.unwrap();

        assert_ne!(copy.id, source.id);
        assert_eq!(copy.name, "doc-a-b");
    }

    #[tokio::test]
    async fn failed_pre_hook_aborts_copy_without_persisting() {
        let db = memory_pool().await;
        let mut hooks = HookRegistry::default();
        hooks.register_pre(COPY_ITEM_OP, Arc::new(FailingPreHook));
        let pipeline = ItemPipeline::new(
            Arc::new(SqliteItemStore::new(db.clone())),
            Arc::new(hooks),
        );
        let actor = actor();

        let source = pipeline
            .create_item(&actor, "doc", "folder", None, ItemExtra::default())
            .await
            .unwrap();
        let err = pipeline.copy_item(&actor, source.id, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Hook { op, .. } if op == COPY_ITEM_OP));

        // only the source row remains
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&*db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn delete_runs_post_hooks_after_commit() {
        let mut hooks = HookRegistry::default();
        let counter = Arc::new(CountingPostHook {
            calls: AtomicUsize::new(0),
        });
        hooks.register_post(DELETE_ITEM_OP, counter.clone());
        let pipeline = pipeline_with(hooks).await;
        let actor = actor();

        let item = pipeline
            .create_item(&actor, "doc", "folder", None, ItemExtra::default())
            .await
            .unwrap();
        pipeline.delete_item(&actor, item.id).await.unwrap();

        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            pipeline.get_item(item.id).await,
            Err(PipelineError::ItemNotFound(_))
        ));
    }
}
